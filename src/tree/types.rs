use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// Safety limits to keep hostile persisted values from blowing the stack
pub(crate) const MAX_TREE_DEPTH: usize = 32;
pub(crate) const MAX_LIST_VALUES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Between,
    NotBetween,
    IsEmpty,
    IsNotEmpty,
    SelectAnyIn,
    SelectNotAnyIn,
    Like,
    NotLike,
}

/// How many operand values a rule with a given operator carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Two,
    List,
}

impl Operator {
    pub const ALL: [Operator; 14] = [
        Self::Equal,
        Self::NotEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Between,
        Self::NotBetween,
        Self::IsEmpty,
        Self::IsNotEmpty,
        Self::SelectAnyIn,
        Self::SelectNotAnyIn,
        Self::Like,
        Self::NotLike,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::Less => "less",
            Self::LessOrEqual => "less_or_equal",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::Between => "between",
            Self::NotBetween => "not_between",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::SelectAnyIn => "select_any_in",
            Self::SelectNotAnyIn => "select_not_any_in",
            Self::Like => "like",
            Self::NotLike => "not_like",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    pub fn arity(self) -> Arity {
        match self {
            Self::IsEmpty | Self::IsNotEmpty => Arity::None,
            Self::Between | Self::NotBetween => Arity::Two,
            Self::SelectAnyIn | Self::SelectNotAnyIn => Arity::List,
            _ => Arity::One,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf predicate over a single field.
///
/// `value` holds the operands in order: empty for `is_empty`/`is_not_empty`,
/// `[lo, hi]` for `between`, the candidate set for `select_any_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Vec<Value>,
}

impl Rule {
    pub fn new(field: impl Into<String>, operator: Operator, value: Vec<Value>) -> Self {
        Self { field: field.into(), operator, value }
    }

    pub fn arity_ok(&self) -> bool {
        match self.operator.arity() {
            Arity::None => self.value.is_empty(),
            Arity::One => self.value.len() == 1,
            Arity::Two => self.value.len() == 2,
            Arity::List => !self.value.is_empty() && self.value.len() <= MAX_LIST_VALUES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub combinator: Combinator,
    #[serde(default)]
    pub children: Vec<Arc<Node>>,
}

impl Group {
    pub fn new(combinator: Combinator, children: Vec<Node>) -> Self {
        Self { combinator, children: children.into_iter().map(Arc::new).collect() }
    }

    pub fn empty(combinator: Combinator) -> Self {
        Self { combinator, children: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Group(Group),
    Rule(Rule),
}

impl Node {
    pub fn rule(field: impl Into<String>, operator: Operator, value: Vec<Value>) -> Self {
        Self::Rule(Rule::new(field, operator, value))
    }

    pub fn group(combinator: Combinator, children: Vec<Node>) -> Self {
        Self::Group(Group::new(combinator, children))
    }
}

/// Immutable boolean filter. The root is always a group; edits return a new
/// tree that shares every untouched subtree with the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Node", from = "Node")]
pub struct FilterTree {
    pub(crate) root: Arc<Group>,
}

impl Default for FilterTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl FilterTree {
    pub fn empty() -> Self {
        Self { root: Arc::new(Group::empty(Combinator::And)) }
    }

    pub fn new(root: Group) -> Self {
        Self { root: Arc::new(root) }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// True when the root group has no children. A rule-free tree such as
    /// `NOT(AND())` is not empty: it still restricts matches.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn rule_count(&self) -> usize {
        self.rules().len()
    }

    pub fn rules(&self) -> Vec<&Rule> {
        fn walk<'a>(g: &'a Group, out: &mut Vec<&'a Rule>) {
            for c in &g.children {
                match c.as_ref() {
                    Node::Rule(r) => out.push(r),
                    Node::Group(sub) => walk(sub, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    pub fn depth(&self) -> usize {
        fn d(g: &Group) -> usize {
            1 + g
                .children
                .iter()
                .map(|c| match c.as_ref() {
                    Node::Group(sub) => d(sub),
                    Node::Rule(_) => 0,
                })
                .max()
                .unwrap_or(0)
        }
        d(&self.root)
    }

    pub fn to_json(&self) -> Result<String, crate::errors::FilterError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, crate::errors::FilterError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<FilterTree> for Node {
    fn from(t: FilterTree) -> Self {
        Node::Group(Arc::unwrap_or_clone(t.root))
    }
}

impl From<Node> for FilterTree {
    fn from(n: Node) -> Self {
        match n {
            Node::Group(g) => Self::new(g),
            rule @ Node::Rule(_) => Self::new(Group::new(Combinator::And, vec![rule])),
        }
    }
}
