use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::errors::FilterError;
use crate::schema::SchemaConfig;
use crate::translate::{OutputMode, Translator};
use crate::tree::FilterTree;

/// Programmatic commands; the binary maps its clap subcommands onto these.
pub enum Command {
    Translate { schema: PathBuf, mode: OutputMode, tree: PathBuf },
    Load { schema: PathBuf, mode: OutputMode, value: String },
    Link { tree: PathBuf },
    Validate { schema: PathBuf, tree: PathBuf },
}

fn read_schema(path: &Path) -> Result<SchemaConfig, FilterError> {
    SchemaConfig::from_json(&std::fs::read_to_string(path)?)
}

fn read_tree(path: &Path) -> Result<FilterTree, FilterError> {
    FilterTree::from_json(&std::fs::read_to_string(path)?)
}

/// Run a command and return what it would print.
pub fn run(cfg: &EngineConfig, cmd: Command) -> Result<String, FilterError> {
    match cmd {
        Command::Translate { schema, mode, tree } => {
            let schema = read_schema(&schema)?;
            let tree = read_tree(&tree)?;
            let out = Translator::for_mode(mode).to_persisted(&tree, &schema)?;
            Ok(out.persisted.into_string())
        }
        Command::Load { schema, mode, value } => {
            let schema = read_schema(&schema)?;
            let tree = Translator::for_mode(mode)
                .from_persisted(&value, &schema)
                .map_err(|e| FilterError::LoadFailed(e.to_string()))?;
            tree.to_json()
        }
        Command::Link { tree } => cfg.link_encoder().encode(&read_tree(&tree)?),
        Command::Validate { schema, tree } => {
            let schema = read_schema(&schema)?;
            let tree = read_tree(&tree)?;
            schema.validate_tree(&tree)?;
            Ok(format!("valid rules={}", tree.rule_count()))
        }
    }
}
