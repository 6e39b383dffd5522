//! Field/operator catalog supplied by the hosting form.
//!
//! The catalog is immutable for the lifetime of an editing session; the
//! translators consult it to reject (never coerce) rules that do not fit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::FilterError;
use crate::tree::{Arity, FilterTree, Group, MAX_TREE_DEPTH, Node, Operator, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Date,
    Select,
    MultiSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueWidget {
    Text,
    Number,
    Boolean,
    Date,
    Select,
    MultiSelect,
}

impl DataType {
    pub fn default_operators(self) -> &'static [Operator] {
        use Operator as O;
        match self {
            Self::Text => &[
                O::Equal,
                O::NotEqual,
                O::Like,
                O::NotLike,
                O::IsEmpty,
                O::IsNotEmpty,
                O::SelectAnyIn,
                O::SelectNotAnyIn,
            ],
            Self::Number | Self::Date => &[
                O::Equal,
                O::NotEqual,
                O::Less,
                O::LessOrEqual,
                O::Greater,
                O::GreaterOrEqual,
                O::Between,
                O::NotBetween,
                O::IsEmpty,
                O::IsNotEmpty,
            ],
            Self::Boolean => &[O::Equal, O::NotEqual, O::IsEmpty, O::IsNotEmpty],
            Self::Select => &[
                O::Equal,
                O::NotEqual,
                O::SelectAnyIn,
                O::SelectNotAnyIn,
                O::IsEmpty,
                O::IsNotEmpty,
            ],
            Self::MultiSelect => &[O::SelectAnyIn, O::SelectNotAnyIn, O::IsEmpty, O::IsNotEmpty],
        }
    }

    pub fn default_widget(self) -> ValueWidget {
        match self {
            Self::Text => ValueWidget::Text,
            Self::Number => ValueWidget::Number,
            Self::Boolean => ValueWidget::Boolean,
            Self::Date => ValueWidget::Date,
            Self::Select => ValueWidget::Select,
            Self::MultiSelect => ValueWidget::MultiSelect,
        }
    }

    pub fn accepts(self, v: &Value) -> bool {
        match self {
            Self::Number => v.is_number(),
            Self::Boolean => v.is_boolean(),
            Self::Text | Self::Date | Self::Select | Self::MultiSelect => v.is_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FieldSpecSerde {
    #[serde(rename = "type")]
    data_type: DataType,
    #[serde(default)]
    operators: Option<Vec<Operator>>,
    #[serde(default)]
    widget: Option<ValueWidget>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldSpecSerde")]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub operators: Vec<Operator>,
    pub widget: ValueWidget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl From<FieldSpecSerde> for FieldSpec {
    fn from(s: FieldSpecSerde) -> Self {
        Self {
            data_type: s.data_type,
            operators: s.operators.unwrap_or_else(|| s.data_type.default_operators().to_vec()),
            widget: s.widget.unwrap_or_else(|| s.data_type.default_widget()),
            label: s.label,
        }
    }
}

impl FieldSpec {
    pub fn new(data_type: DataType) -> Self {
        FieldSpecSerde { data_type, operators: None, widget: None, label: None }.into()
    }

    pub fn with_operators(mut self, operators: &[Operator]) -> Self {
        self.operators = operators.to_vec();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    fields: BTreeMap<String, FieldSpec>,
}

impl SchemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, id: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(id.into(), spec);
        self
    }

    /// # Errors
    /// Returns an error if the JSON is malformed or names an unknown type/operator.
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.get(id)
    }

    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Check one rule against the catalog and its operator's arity.
    pub fn validate_rule(&self, rule: &Rule) -> Result<(), FilterError> {
        self.check_catalog(rule)?;
        check_arity(rule)
    }

    // Field, operator and value type: everything the schema itself decides.
    fn check_catalog(&self, rule: &Rule) -> Result<(), FilterError> {
        let spec = self
            .field(&rule.field)
            .ok_or_else(|| FilterError::SchemaMismatch(format!("unknown field `{}`", rule.field)))?;
        if !spec.operators.contains(&rule.operator) {
            return Err(FilterError::SchemaMismatch(format!(
                "operator `{}` is not allowed for field `{}`",
                rule.operator, rule.field
            )));
        }
        if let Some(bad) = rule.value.iter().find(|v| !spec.data_type.accepts(v)) {
            return Err(FilterError::SchemaMismatch(format!(
                "value {bad} does not fit field `{}` of type {:?}",
                rule.field, spec.data_type
            )));
        }
        Ok(())
    }

    /// Validate every rule in the tree.
    ///
    /// Schema mismatches anywhere in the tree are reported before shape
    /// problems (value counts, nesting depth), so a tree naming an unknown
    /// field always fails with `SchemaMismatch`.
    pub fn validate_tree(&self, tree: &FilterTree) -> Result<(), FilterError> {
        let (rules, depth) = collect_rules(tree.root());
        for rule in &rules {
            self.check_catalog(rule)?;
        }
        if depth > MAX_TREE_DEPTH {
            return Err(FilterError::Translation(format!(
                "tree nesting exceeds {MAX_TREE_DEPTH} levels"
            )));
        }
        rules.into_iter().try_for_each(check_arity)
    }
}

fn check_arity(rule: &Rule) -> Result<(), FilterError> {
    if rule.arity_ok() {
        return Ok(());
    }
    let expected = match rule.operator.arity() {
        Arity::None => "no values",
        Arity::One => "exactly one value",
        Arity::Two => "exactly two values",
        Arity::List => "a non-empty list of values",
    };
    Err(FilterError::Translation(format!(
        "operator `{}` on field `{}` expects {expected}, got {}",
        rule.operator,
        rule.field,
        rule.value.len()
    )))
}

// Rules in document order plus the deepest group level; iterative so
// over-deep trees are measured without recursing.
fn collect_rules(root: &Group) -> (Vec<&Rule>, usize) {
    let mut rules = Vec::new();
    let mut deepest = 0;
    let mut stack = vec![(root, 1usize, 0usize)];
    while let Some((group, depth, next)) = stack.pop() {
        deepest = deepest.max(depth);
        let Some(child) = group.children.get(next) else { continue };
        stack.push((group, depth, next + 1));
        match child.as_ref() {
            Node::Rule(r) => rules.push(r),
            Node::Group(sub) => stack.push((sub, depth + 1, 0)),
        }
    }
    (rules, deepest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Combinator;
    use serde_json::json;

    fn schema() -> SchemaConfig {
        SchemaConfig::from_json(
            r#"{"fields":{
                "owner":{"type":"text"},
                "rows":{"type":"number","operators":["greater","less"]}
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_fill_missing_operators_and_widget() {
        let s = schema();
        let owner = s.field("owner").unwrap();
        assert_eq!(owner.widget, ValueWidget::Text);
        assert!(owner.operators.contains(&Operator::Like));
        assert_eq!(s.field("rows").unwrap().operators, vec![Operator::Greater, Operator::Less]);
    }

    #[test]
    fn rejects_unknown_field_and_disallowed_operator() {
        let s = schema();
        let unknown = Rule::new("team", Operator::Equal, vec![json!("x")]);
        assert!(matches!(s.validate_rule(&unknown), Err(FilterError::SchemaMismatch(_))));
        let op = Rule::new("rows", Operator::Equal, vec![json!(1)]);
        assert!(matches!(s.validate_rule(&op), Err(FilterError::SchemaMismatch(_))));
    }

    #[test]
    fn rejects_wrong_value_type_without_coercion() {
        let s = schema();
        let r = Rule::new("rows", Operator::Greater, vec![json!("10")]);
        assert!(matches!(s.validate_rule(&r), Err(FilterError::SchemaMismatch(_))));
    }

    #[test]
    fn arity_errors_are_translation_errors() {
        let s = schema();
        let r = Rule::new("owner", Operator::IsEmpty, vec![json!("x")]);
        assert!(matches!(s.validate_rule(&r), Err(FilterError::Translation(_))));
    }

    #[test]
    fn unknown_field_outranks_earlier_arity_error() {
        let t = FilterTree::new(Group::new(
            Combinator::And,
            vec![
                Node::rule("owner", Operator::IsEmpty, vec![json!("x")]),
                Node::rule("team", Operator::Equal, vec![json!("x")]),
            ],
        ));
        match schema().validate_tree(&t) {
            Err(FilterError::SchemaMismatch(msg)) => assert!(msg.contains("team")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_field_outranks_depth_limit() {
        let mut node = Node::rule("team", Operator::Equal, vec![json!("x")]);
        for _ in 0..MAX_TREE_DEPTH + 4 {
            node = Node::group(Combinator::And, vec![node]);
        }
        let t = FilterTree::from(node);
        assert!(matches!(schema().validate_tree(&t), Err(FilterError::SchemaMismatch(_))));
    }

    #[test]
    fn over_deep_valid_tree_is_translation_error() {
        let mut node = Node::rule("owner", Operator::IsNotEmpty, vec![]);
        for _ in 0..MAX_TREE_DEPTH + 4 {
            node = Node::group(Combinator::And, vec![node]);
        }
        let t = FilterTree::from(node);
        assert!(matches!(schema().validate_tree(&t), Err(FilterError::Translation(_))));
    }

    #[test]
    fn unknown_operator_in_schema_fails_to_parse() {
        let e = SchemaConfig::from_json(r#"{"fields":{"a":{"type":"text","operators":["near"]}}}"#);
        assert!(e.is_err());
    }
}
