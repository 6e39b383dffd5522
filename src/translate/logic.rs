use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FilterError;
use crate::schema::SchemaConfig;
use crate::tree::{Arity, Combinator, FilterTree, Group, MAX_TREE_DEPTH, Node, Operator, Rule};

/// Generic `{operator, operands}` boolean expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicExpression {
    pub operator: String,
    #[serde(default)]
    pub operands: Vec<Operand>,
}

/// An operand is either a nested expression or a JSON literal.
///
/// Variants are tried in order, so any object carrying an `operator` key
/// decodes as `Expression`. Rule values are scalars or arrays of scalars,
/// never such objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Expression(LogicExpression),
    Literal(Value),
}

const AND: &str = "and";
const OR: &str = "or";
const NOT: &str = "!";

impl LogicExpression {
    pub fn new(operator: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self { operator: operator.into(), operands }
    }

    pub fn parse(json: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn logic_name(op: Operator) -> &'static str {
    match op {
        Operator::SelectAnyIn => "in",
        Operator::SelectNotAnyIn => "not_in",
        other => other.as_str(),
    }
}

fn parse_logic_name(name: &str) -> Option<Operator> {
    match name {
        "in" => Some(Operator::SelectAnyIn),
        "not_in" => Some(Operator::SelectNotAnyIn),
        // the long names belong to the tree, not to this wire format
        "select_any_in" | "select_not_any_in" => None,
        other => Operator::parse(other),
    }
}

fn rule_to_expr(rule: &Rule) -> LogicExpression {
    let mut operands = vec![Operand::Literal(Value::String(rule.field.clone()))];
    match rule.operator.arity() {
        Arity::List => operands.push(Operand::Literal(Value::Array(rule.value.clone()))),
        _ => operands.extend(rule.value.iter().cloned().map(Operand::Literal)),
    }
    LogicExpression::new(logic_name(rule.operator), operands)
}

fn group_to_expr(group: &Group) -> LogicExpression {
    if group.children.is_empty() {
        return LogicExpression::new(AND, vec![]);
    }
    let mut children: Vec<Operand> =
        group.children.iter().map(|c| Operand::Expression(node_to_expr(c))).collect();
    match group.combinator {
        Combinator::And => LogicExpression::new(AND, children),
        Combinator::Or => LogicExpression::new(OR, children),
        Combinator::Not => {
            let inner = if children.len() == 1 {
                children.remove(0)
            } else {
                Operand::Expression(LogicExpression::new(AND, children))
            };
            LogicExpression::new(NOT, vec![inner])
        }
    }
}

fn node_to_expr(node: &Node) -> LogicExpression {
    match node {
        Node::Group(g) => group_to_expr(g),
        Node::Rule(r) => rule_to_expr(r),
    }
}

/// Translate a tree into a logic expression after validating it.
pub fn to_logic_expression(tree: &FilterTree, schema: &SchemaConfig) -> Result<LogicExpression, FilterError> {
    schema.validate_tree(tree)?;
    crate::dev6!("logic: translated {} rule(s)", tree.rule_count());
    Ok(group_to_expr(tree.root()))
}

fn literal(op: &Operand, what: &str) -> Result<Value, FilterError> {
    match op {
        Operand::Literal(v) => Ok(v.clone()),
        Operand::Expression(e) => Err(FilterError::Translation(format!(
            "{what} must be a literal, found nested `{}` expression",
            e.operator
        ))),
    }
}

fn expr_to_rule(op: Operator, expr: &LogicExpression) -> Result<Node, FilterError> {
    let (field_op, rest) = expr.operands.split_first().ok_or_else(|| {
        FilterError::Translation(format!("`{}` expression has no operands", expr.operator))
    })?;
    let field = match literal(field_op, "field operand")? {
        Value::String(s) => s,
        other => {
            return Err(FilterError::Translation(format!(
                "`{}` expects a field name first, found {other}",
                expr.operator
            )));
        }
    };
    let value = match op.arity() {
        Arity::List => match rest {
            [Operand::Literal(Value::Array(items))] => items.clone(),
            _ => {
                return Err(FilterError::Translation(format!(
                    "`{}` expects a single list operand",
                    expr.operator
                )));
            }
        },
        _ => rest.iter().map(|o| literal(o, "value operand")).collect::<Result<Vec<_>, _>>()?,
    };
    Ok(Node::rule(field, op, value))
}

fn expr_to_node(expr: &LogicExpression, depth: usize) -> Result<Node, FilterError> {
    if depth > MAX_TREE_DEPTH {
        return Err(FilterError::Translation(format!("expression nesting exceeds {MAX_TREE_DEPTH} levels")));
    }
    let children = || -> Result<Vec<Node>, FilterError> {
        expr.operands
            .iter()
            .map(|o| match o {
                Operand::Expression(e) => expr_to_node(e, depth + 1),
                Operand::Literal(v) => Err(FilterError::Translation(format!(
                    "`{}` expects nested expressions, found literal {v}",
                    expr.operator
                ))),
            })
            .collect()
    };
    match expr.operator.as_str() {
        AND => Ok(Node::group(Combinator::And, children()?)),
        OR => Ok(Node::group(Combinator::Or, children()?)),
        NOT => {
            let mut inner = children()?;
            if inner.len() != 1 {
                return Err(FilterError::Translation(format!(
                    "`!` takes exactly one operand, got {}",
                    inner.len()
                )));
            }
            Ok(Node::group(Combinator::Not, vec![inner.remove(0)]))
        }
        name => match parse_logic_name(name) {
            Some(op) => expr_to_rule(op, expr),
            None => Err(FilterError::Translation(format!("unknown logic operator `{name}`"))),
        },
    }
}

/// Rebuild a tree from a logic expression and validate it against the schema.
pub fn from_logic_expression(expr: &LogicExpression, schema: &SchemaConfig) -> Result<FilterTree, FilterError> {
    let tree = FilterTree::from(expr_to_node(expr, 1)?);
    schema.validate_tree(&tree)?;
    crate::dev6!("logic: rebuilt tree with {} rule(s)", tree.rule_count());
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldSpec};
    use serde_json::json;

    fn schema() -> SchemaConfig {
        SchemaConfig::new()
            .with_field("owner", FieldSpec::new(DataType::Text))
            .with_field("rows", FieldSpec::new(DataType::Number))
    }

    #[test]
    fn owner_equal_alice() {
        let t = FilterTree::new(Group::new(
            Combinator::And,
            vec![Node::rule("owner", Operator::Equal, vec![json!("alice")])],
        ));
        let e = to_logic_expression(&t, &schema()).unwrap();
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({"operator":"and","operands":[{"operator":"equal","operands":["owner","alice"]}]})
        );
    }

    #[test]
    fn list_operands_travel_as_one_array() {
        let t = FilterTree::new(Group::new(
            Combinator::Not,
            vec![Node::rule("owner", Operator::SelectAnyIn, vec![json!("a"), json!("b")])],
        ));
        let e = to_logic_expression(&t, &schema()).unwrap();
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({"operator":"!","operands":[{"operator":"in","operands":["owner",["a","b"]]}]})
        );
        let back = from_logic_expression(&e, &schema()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn unknown_operator_is_named() {
        let e = LogicExpression::parse(r#"{"operator":"near","operands":["owner","x"]}"#).unwrap();
        match from_logic_expression(&e, &schema()) {
            Err(FilterError::Translation(msg)) => assert!(msg.contains("near")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn nested_expression_in_value_position_is_rejected() {
        let e = LogicExpression::parse(
            r#"{"operator":"equal","operands":["owner",{"operator":"and","operands":[]}]}"#,
        )
        .unwrap();
        assert!(matches!(from_logic_expression(&e, &schema()), Err(FilterError::Translation(_))));
    }

    #[test]
    fn like_survives_logic_format() {
        let t = FilterTree::new(Group::new(
            Combinator::Or,
            vec![Node::rule("owner", Operator::Like, vec![json!("ali")])],
        ));
        let e = to_logic_expression(&t, &schema()).unwrap();
        assert_eq!(from_logic_expression(&e, &schema()).unwrap(), t);
    }
}
