//! Search-engine boolean query (`bool.must/should/must_not` of
//! `term`/`terms`/`range`/`exists`). Field names on the wire are an external
//! contract with stored filters and must not change.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::FilterError;
use crate::schema::SchemaConfig;
use crate::tree::{Combinator, FilterTree, Group, MAX_TREE_DEPTH, Node, Operator, Rule};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolClause {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Clause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Bool(BoolClause),
    Term(BTreeMap<String, Value>),
    Terms(BTreeMap<String, Vec<Value>>),
    Range(BTreeMap<String, RangeBounds>),
    Exists { field: String },
    MatchAll {},
}

/// Top-level `{"query": ...}` wrapper sent to the search backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchFilter {
    pub query: Clause,
}

impl SearchFilter {
    pub fn match_all() -> Self {
        Self { query: Clause::MatchAll {} }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self.query, Clause::MatchAll {})
    }

    /// # Errors
    /// Fails on malformed JSON, a missing `query` key, or an unknown clause kind.
    pub fn parse(json: &str) -> Result<Self, FilterError> {
        let v: Value = serde_json::from_str(json)?;
        Self::try_from(&v)
    }

    pub fn to_value(&self) -> Result<Value, FilterError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl TryFrom<&Value> for SearchFilter {
    type Error = FilterError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        let query = v
            .as_object()
            .and_then(|o| o.get("query"))
            .ok_or_else(|| FilterError::Translation("search filter has no `query` object".into()))?;
        Ok(Self { query: parse_clause(query, 1)? })
    }
}

fn single_entry<'a>(what: &str, v: &'a Value) -> Result<(&'a String, &'a Value), FilterError> {
    let obj = v
        .as_object()
        .ok_or_else(|| FilterError::Translation(format!("{what} must be an object")))?;
    let mut it = obj.iter();
    match (it.next(), it.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(FilterError::Translation(format!("{what} must have exactly one key"))),
    }
}

fn parse_clause_list(v: &Value, depth: usize) -> Result<Vec<Clause>, FilterError> {
    match v {
        Value::Array(items) => items.iter().map(|c| parse_clause(c, depth)).collect(),
        // a single clause object is accepted in place of a one-element list
        Value::Object(_) => Ok(vec![parse_clause(v, depth)?]),
        _ => Err(FilterError::Translation("bool section must be a list of clauses".into())),
    }
}

fn parse_bool(body: &Map<String, Value>, depth: usize) -> Result<BoolClause, FilterError> {
    let mut out = BoolClause::default();
    for (k, v) in body {
        match k.as_str() {
            "must" => out.must = parse_clause_list(v, depth + 1)?,
            "filter" => out.filter = parse_clause_list(v, depth + 1)?,
            "should" => out.should = parse_clause_list(v, depth + 1)?,
            "must_not" => out.must_not = parse_clause_list(v, depth + 1)?,
            "minimum_should_match" => {
                let n = match v {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.parse::<u64>().ok(),
                    _ => None,
                };
                let n = n.and_then(|n| u32::try_from(n).ok()).ok_or_else(|| {
                    FilterError::Translation(format!("unsupported minimum_should_match {v}"))
                })?;
                out.minimum_should_match = Some(n);
            }
            // scoring knobs do not change the matching set
            "boost" | "_name" => {}
            other => {
                return Err(FilterError::Translation(format!("unknown bool section `{other}`")));
            }
        }
    }
    Ok(out)
}

fn parse_clause(v: &Value, depth: usize) -> Result<Clause, FilterError> {
    if depth > MAX_TREE_DEPTH {
        return Err(FilterError::Translation(format!("query nesting exceeds {MAX_TREE_DEPTH} levels")));
    }
    let (kind, body) = single_entry("clause", v)?;
    match kind.as_str() {
        "bool" => {
            let obj = body
                .as_object()
                .ok_or_else(|| FilterError::Translation("`bool` clause must be an object".into()))?;
            Ok(Clause::Bool(parse_bool(obj, depth)?))
        }
        "term" => {
            let (field, value) = single_entry("`term` clause", body)?;
            // long form: {"term": {"f": {"value": v}}}
            let value = match value.as_object().and_then(|o| o.get("value")) {
                Some(inner) => inner.clone(),
                None => value.clone(),
            };
            Ok(Clause::Term(BTreeMap::from([(field.clone(), value)])))
        }
        "terms" => {
            let (field, values) = single_entry("`terms` clause", body)?;
            let values = values
                .as_array()
                .ok_or_else(|| FilterError::Translation("`terms` values must be a list".into()))?;
            Ok(Clause::Terms(BTreeMap::from([(field.clone(), values.clone())])))
        }
        "range" => {
            let (field, bounds) = single_entry("`range` clause", body)?;
            let obj = bounds
                .as_object()
                .ok_or_else(|| FilterError::Translation("`range` bounds must be an object".into()))?;
            let mut rb = RangeBounds::default();
            for (k, b) in obj {
                let slot = match k.as_str() {
                    "gt" => &mut rb.gt,
                    "gte" => &mut rb.gte,
                    "lt" => &mut rb.lt,
                    "lte" => &mut rb.lte,
                    other => {
                        return Err(FilterError::Translation(format!("unknown range bound `{other}`")));
                    }
                };
                *slot = Some(b.clone());
            }
            Ok(Clause::Range(BTreeMap::from([(field.clone(), rb)])))
        }
        "exists" => {
            let field = body
                .as_object()
                .and_then(|o| o.get("field"))
                .and_then(Value::as_str)
                .ok_or_else(|| FilterError::Translation("`exists` clause needs a `field`".into()))?;
            Ok(Clause::Exists { field: field.to_string() })
        }
        "match_all" => Ok(Clause::MatchAll {}),
        other => Err(FilterError::Translation(format!("unknown clause kind `{other}`"))),
    }
}

// ---- forward: tree -> search filter ----

fn negate(c: Clause) -> Clause {
    Clause::Bool(BoolClause { must_not: vec![c], ..Default::default() })
}

fn one(field: &str, v: &Value) -> BTreeMap<String, Value> {
    BTreeMap::from([(field.to_string(), v.clone())])
}

fn range(field: &str, rb: RangeBounds) -> Clause {
    Clause::Range(BTreeMap::from([(field.to_string(), rb)]))
}

fn rule_to_clause(rule: &Rule) -> Result<Clause, FilterError> {
    let f = rule.field.as_str();
    // arity was checked by validate_tree
    let v = &rule.value;
    let first = || v.first().cloned();
    Ok(match rule.operator {
        Operator::Equal => Clause::Term(one(f, &v[0])),
        Operator::NotEqual => negate(Clause::Term(one(f, &v[0]))),
        Operator::Less => range(f, RangeBounds { lt: first(), ..Default::default() }),
        Operator::LessOrEqual => range(f, RangeBounds { lte: first(), ..Default::default() }),
        Operator::Greater => range(f, RangeBounds { gt: first(), ..Default::default() }),
        Operator::GreaterOrEqual => range(f, RangeBounds { gte: first(), ..Default::default() }),
        Operator::Between | Operator::NotBetween => {
            let c = range(
                f,
                RangeBounds { gte: Some(v[0].clone()), lte: Some(v[1].clone()), ..Default::default() },
            );
            if rule.operator == Operator::NotBetween { negate(c) } else { c }
        }
        Operator::IsNotEmpty => Clause::Exists { field: f.to_string() },
        Operator::IsEmpty => negate(Clause::Exists { field: f.to_string() }),
        Operator::SelectAnyIn => Clause::Terms(BTreeMap::from([(f.to_string(), v.clone())])),
        Operator::SelectNotAnyIn => {
            negate(Clause::Terms(BTreeMap::from([(f.to_string(), v.clone())])))
        }
        Operator::Like | Operator::NotLike => {
            return Err(FilterError::Translation(format!(
                "operator `{}` on field `{f}` has no search query mapping",
                rule.operator
            )));
        }
    })
}

fn group_to_clause(group: &Group) -> Result<Clause, FilterError> {
    if group.children.is_empty() {
        return Ok(Clause::MatchAll {});
    }
    let children = group.children.iter().map(|c| node_to_clause(c)).collect::<Result<Vec<_>, _>>()?;
    Ok(Clause::Bool(match group.combinator {
        Combinator::And => BoolClause { must: children, ..Default::default() },
        Combinator::Or => BoolClause { should: children, ..Default::default() },
        Combinator::Not => {
            let inner = if children.len() == 1 {
                children.into_iter().next().unwrap_or(Clause::MatchAll {})
            } else {
                Clause::Bool(BoolClause { must: children, ..Default::default() })
            };
            BoolClause { must_not: vec![inner], ..Default::default() }
        }
    }))
}

fn node_to_clause(node: &Node) -> Result<Clause, FilterError> {
    match node {
        Node::Group(g) => group_to_clause(g),
        Node::Rule(r) => rule_to_clause(r),
    }
}

/// Translate a tree into a search filter.
///
/// # Errors
/// `SchemaMismatch` for fields/operators/values the schema does not allow;
/// `Translation` for operators the search grammar cannot express.
pub fn to_search_filter(tree: &FilterTree, schema: &SchemaConfig) -> Result<SearchFilter, FilterError> {
    schema.validate_tree(tree)?;
    let query = group_to_clause(tree.root())?;
    crate::dev6!("search: translated {} rule(s)", tree.rule_count());
    Ok(SearchFilter { query })
}

// ---- reverse: search filter -> tree ----

fn leaf_rule(field: &str, op: Operator, value: Vec<Value>) -> Node {
    Node::rule(field, op, value)
}

fn range_to_node(field: &str, rb: &RangeBounds) -> Result<Node, FilterError> {
    if let (Some(lo), Some(hi), None, None) = (&rb.gte, &rb.lte, &rb.gt, &rb.lt) {
        return Ok(leaf_rule(field, Operator::Between, vec![lo.clone(), hi.clone()]));
    }
    let mut rules = Vec::new();
    for (bound, op) in [
        (&rb.gt, Operator::Greater),
        (&rb.gte, Operator::GreaterOrEqual),
        (&rb.lt, Operator::Less),
        (&rb.lte, Operator::LessOrEqual),
    ] {
        if let Some(b) = bound {
            rules.push(leaf_rule(field, op, vec![b.clone()]));
        }
    }
    match rules.len() {
        0 => Err(FilterError::Translation(format!("range on `{field}` has no bounds"))),
        1 => Ok(rules.remove(0)),
        _ => Ok(Node::group(Combinator::And, rules)),
    }
}

// Negated leaves that have a dedicated operator, so a reload restores the
// rule the user actually built instead of a NOT group around it.
fn negated_leaf(c: &Clause) -> Option<Node> {
    match c {
        Clause::Term(m) => {
            let (f, v) = m.iter().next()?;
            Some(leaf_rule(f, Operator::NotEqual, vec![v.clone()]))
        }
        Clause::Terms(m) => {
            let (f, vs) = m.iter().next()?;
            Some(leaf_rule(f, Operator::SelectNotAnyIn, vs.clone()))
        }
        Clause::Exists { field } => Some(leaf_rule(field, Operator::IsEmpty, vec![])),
        Clause::Range(m) => {
            let (f, rb) = m.iter().next()?;
            match (&rb.gte, &rb.lte, &rb.gt, &rb.lt) {
                (Some(lo), Some(hi), None, None) => {
                    Some(leaf_rule(f, Operator::NotBetween, vec![lo.clone(), hi.clone()]))
                }
                _ => None,
            }
        }
        Clause::Bool(_) | Clause::MatchAll {} => None,
    }
}

fn not_node(c: &Clause) -> Result<Node, FilterError> {
    if let Some(n) = negated_leaf(c) {
        return Ok(n);
    }
    Ok(Node::group(Combinator::Not, vec![clause_to_node(c)?]))
}

fn bool_to_node(b: &BoolClause) -> Result<Node, FilterError> {
    let required: Vec<&Clause> = b.must.iter().chain(b.filter.iter()).collect();

    // without must/filter at least one should entry has to match; next to
    // them should is scoring-only unless minimum_should_match says otherwise
    let should_node = if b.should.is_empty() {
        None
    } else {
        let default_msm = if required.is_empty() { 1 } else { 0 };
        match b.minimum_should_match.unwrap_or(default_msm) {
            1 => {
                let alts = b.should.iter().map(clause_to_node).collect::<Result<Vec<_>, _>>()?;
                Some(Node::group(Combinator::Or, alts))
            }
            0 => {
                return Err(FilterError::Translation(
                    "bool clause with optional `should` entries cannot be represented".into(),
                ));
            }
            n => {
                return Err(FilterError::Translation(format!(
                    "minimum_should_match {n} is not supported"
                )));
            }
        }
    };

    if required.is_empty() && b.must_not.is_empty() {
        return Ok(should_node.unwrap_or_else(|| Node::group(Combinator::And, vec![])));
    }

    if required.is_empty() && should_node.is_none() {
        if let [only] = b.must_not.as_slice() {
            return not_node(only);
        }
    }

    // must_not [a, b] excludes both: a conjunction of negations
    let mut parts = required.into_iter().map(clause_to_node).collect::<Result<Vec<_>, _>>()?;
    parts.extend(should_node);
    for c in &b.must_not {
        parts.push(not_node(c)?);
    }
    Ok(Node::group(Combinator::And, parts))
}

fn clause_to_node(c: &Clause) -> Result<Node, FilterError> {
    Ok(match c {
        Clause::Bool(b) => return bool_to_node(b),
        Clause::Term(m) => {
            let (f, v) = m
                .iter()
                .next()
                .ok_or_else(|| FilterError::Translation("empty `term` clause".into()))?;
            leaf_rule(f, Operator::Equal, vec![v.clone()])
        }
        Clause::Terms(m) => {
            let (f, vs) = m
                .iter()
                .next()
                .ok_or_else(|| FilterError::Translation("empty `terms` clause".into()))?;
            leaf_rule(f, Operator::SelectAnyIn, vs.clone())
        }
        Clause::Range(m) => {
            let (f, rb) = m
                .iter()
                .next()
                .ok_or_else(|| FilterError::Translation("empty `range` clause".into()))?;
            return range_to_node(f, rb);
        }
        Clause::Exists { field } => leaf_rule(field, Operator::IsNotEmpty, vec![]),
        Clause::MatchAll {} => Node::group(Combinator::And, vec![]),
    })
}

/// Rebuild a tree from a search filter and validate it against the schema.
pub fn from_search_filter(filter: &SearchFilter, schema: &SchemaConfig) -> Result<FilterTree, FilterError> {
    let tree = FilterTree::from(clause_to_node(&filter.query)?);
    schema.validate_tree(&tree)?;
    crate::dev6!("search: rebuilt tree with {} rule(s)", tree.rule_count());
    Ok(tree)
}
