use serde_json::Value;
use std::cmp::Ordering;

use super::types::{Combinator, FilterTree, Group, MAX_TREE_DEPTH, Node, Operator, Rule};

/// Evaluate a tree against a single JSON record.
///
/// Empty groups match everything regardless of combinator, mirroring the
/// `match_all` clause they translate to. A missing field fails every positive
/// predicate and satisfies every negated one.
pub fn eval_tree(tree: &FilterTree, record: &Value) -> bool {
    eval_group(tree.root(), record)
}

fn eval_group(group: &Group, record: &Value) -> bool {
    if group.children.is_empty() {
        return true;
    }
    let mut results = group.children.iter().map(|c| eval_node(c, record));
    match group.combinator {
        Combinator::And => results.all(|b| b),
        Combinator::Or => results.any(|b| b),
        Combinator::Not => !results.all(|b| b),
    }
}

fn eval_node(node: &Node, record: &Value) -> bool {
    match node {
        Node::Group(g) => eval_group(g, record),
        Node::Rule(r) => eval_rule(r, record),
    }
}

fn eval_rule(rule: &Rule, record: &Value) -> bool {
    let field = get_path(record, &rule.field);
    let arg = rule.value.first();
    match rule.operator {
        Operator::Equal => arg.is_some_and(|a| any_value(field, |v| v == a)),
        Operator::NotEqual => !arg.is_some_and(|a| any_value(field, |v| v == a)),
        Operator::Less => arg.is_some_and(|a| any_value(field, |v| cmp(v, a) == Some(Ordering::Less))),
        Operator::LessOrEqual => {
            arg.is_some_and(|a| any_value(field, |v| matches!(cmp(v, a), Some(Ordering::Less | Ordering::Equal))))
        }
        Operator::Greater => {
            arg.is_some_and(|a| any_value(field, |v| cmp(v, a) == Some(Ordering::Greater)))
        }
        Operator::GreaterOrEqual => arg.is_some_and(|a| {
            any_value(field, |v| matches!(cmp(v, a), Some(Ordering::Greater | Ordering::Equal)))
        }),
        Operator::Between => between(field, &rule.value),
        Operator::NotBetween => !between(field, &rule.value),
        Operator::IsNotEmpty => exists(field),
        Operator::IsEmpty => !exists(field),
        Operator::SelectAnyIn => any_value(field, |v| rule.value.contains(v)),
        Operator::SelectNotAnyIn => !any_value(field, |v| rule.value.contains(v)),
        Operator::Like => arg.is_some_and(|a| like(field, a)),
        Operator::NotLike => !arg.is_some_and(|a| like(field, a)),
    }
}

fn between(field: Option<&Value>, bounds: &[Value]) -> bool {
    let [lo, hi] = bounds else { return false };
    any_value(field, |v| {
        matches!(cmp(v, lo), Some(Ordering::Greater | Ordering::Equal))
            && matches!(cmp(v, hi), Some(Ordering::Less | Ordering::Equal))
    })
}

fn like(field: Option<&Value>, needle: &Value) -> bool {
    let Value::String(n) = needle else { return false };
    let n = n.to_lowercase();
    any_value(field, |v| matches!(v, Value::String(s) if s.to_lowercase().contains(&n)))
}

// Null and empty arrays count as absent.
fn exists(field: Option<&Value>) -> bool {
    match field {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().any(|v| !v.is_null()),
        Some(_) => true,
    }
}

// Array-valued fields match when any element matches.
fn any_value(field: Option<&Value>, mut pred: impl FnMut(&Value) -> bool) -> bool {
    match field {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().any(pred),
        Some(v) => pred(v),
    }
}

fn get_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = record;
    for (segs, part) in path.split('.').enumerate() {
        if segs >= MAX_TREE_DEPTH {
            return None;
        }
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

/// Order two JSON scalars of the same kind; mixed kinds are incomparable.
fn cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64()?, y.as_f64()?);
            Some(x.total_cmp(&y))
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
