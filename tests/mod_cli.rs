mod common;

use filtersync::cli::{Command, run};
use filtersync::config::EngineConfig;
use filtersync::{Combinator, FilterError, FilterTree, Group, Node, Operator, OutputMode};
use serde_json::json;
use std::path::PathBuf;

const SCHEMA: &str = r#"{"fields":{"owner":{"type":"text"},"rows":{"type":"number"}}}"#;

struct Fixture {
    _dir: tempfile::TempDir,
    schema: PathBuf,
    tree: PathBuf,
}

fn fixture(tree: &FilterTree) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("schema.json");
    let tree_path = dir.path().join("tree.json");
    std::fs::write(&schema, SCHEMA).unwrap();
    std::fs::write(&tree_path, tree.to_json().unwrap()).unwrap();
    Fixture { _dir: dir, schema, tree: tree_path }
}

fn alice() -> FilterTree {
    FilterTree::new(Group::new(
        Combinator::And,
        vec![Node::rule("owner", Operator::Equal, vec![json!("alice")])],
    ))
}

#[test]
fn translate_prints_persisted_value() {
    let fx = fixture(&alice());
    let cfg = EngineConfig::default();
    let out = run(
        &cfg,
        Command::Translate { schema: fx.schema.clone(), mode: OutputMode::SearchDsl, tree: fx.tree.clone() },
    )
    .unwrap();
    assert_eq!(out, r#"{"query":{"bool":{"must":[{"term":{"owner":"alice"}}]}}}"#);

    let out = run(&cfg, Command::Translate { schema: fx.schema, mode: OutputMode::LogicExpression, tree: fx.tree })
        .unwrap();
    assert!(out.starts_with(r#"{"operator":"and""#));
}

#[test]
fn load_prints_tree_json() {
    let fx = fixture(&alice());
    let out = run(
        &EngineConfig::default(),
        Command::Load {
            schema: fx.schema,
            mode: OutputMode::LogicExpression,
            value: r#"{"operator":"and","operands":[{"operator":"equal","operands":["owner","alice"]}]}"#.into(),
        },
    )
    .unwrap();
    assert_eq!(FilterTree::from_json(&out).unwrap(), alice());
}

#[test]
fn load_failure_is_load_failed() {
    let fx = fixture(&alice());
    let err = run(
        &EngineConfig::default(),
        Command::Load { schema: fx.schema, mode: OutputMode::SearchDsl, value: "[]".into() },
    )
    .unwrap_err();
    assert!(matches!(err, FilterError::LoadFailed(_)));
}

#[test]
fn link_uses_configured_base() {
    let fx = fixture(&alice());
    let mut cfg = EngineConfig::default();
    cfg.explore_base_path = "/rows".into();
    let out = run(&cfg, Command::Link { tree: fx.tree }).unwrap();
    assert!(out.starts_with("/rows?queryFilter=%7B"));
    assert_eq!(cfg.link_encoder().decode(&out).unwrap(), Some(alice()));
}

#[test]
fn validate_reports_unknown_field() {
    let bad = FilterTree::new(Group::new(
        Combinator::And,
        vec![Node::rule("tier", Operator::Equal, vec![json!("gold")])],
    ));
    let fx = fixture(&bad);
    let err = run(&EngineConfig::default(), Command::Validate { schema: fx.schema, tree: fx.tree })
        .unwrap_err();
    assert!(matches!(err, FilterError::SchemaMismatch(_)));

    let fx = fixture(&alice());
    let out = run(&EngineConfig::default(), Command::Validate { schema: fx.schema, tree: fx.tree }).unwrap();
    assert_eq!(out, "valid rules=1");
}

#[test]
fn missing_file_is_io_error() {
    let err = run(
        &EngineConfig::default(),
        Command::Link { tree: PathBuf::from("/definitely/not/here.json") },
    )
    .unwrap_err();
    assert!(matches!(err, FilterError::Io(_)));
}
