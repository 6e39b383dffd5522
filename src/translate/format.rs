use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::FilterError;
use crate::schema::SchemaConfig;
use crate::tree::FilterTree;

use super::logic::{LogicExpression, from_logic_expression, to_logic_expression};
use super::search::{SearchFilter, from_search_filter, to_search_filter};

/// Which wire representation an instance produces and consumes. Fixed per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    SearchDsl,
    LogicExpression,
}

impl FromStr for OutputMode {
    type Err = FilterError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "search" | "search_dsl" | "search-dsl" => Ok(Self::SearchDsl),
            "logic" | "logic_expression" | "logic-expression" => Ok(Self::LogicExpression),
            other => Err(FilterError::Translation(format!("unknown output mode `{other}`"))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SearchDsl => "search_dsl",
            Self::LogicExpression => "logic_expression",
        })
    }
}

/// Serialized wire value handed to the form; opaque outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedValue(String);

impl PersistedValue {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PersistedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A forward/reverse pair for one wire format.
pub trait WireFormat {
    type Wire: Serialize;

    fn mode(&self) -> OutputMode;
    fn forward(&self, tree: &FilterTree, schema: &SchemaConfig) -> Result<Self::Wire, FilterError>;
    fn reverse(&self, wire: &Self::Wire, schema: &SchemaConfig) -> Result<FilterTree, FilterError>;
    fn decode(&self, persisted: &str) -> Result<Self::Wire, FilterError>;

    fn encode(&self, wire: &Self::Wire) -> Result<PersistedValue, FilterError> {
        Ok(PersistedValue(serde_json::to_string(wire)?))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchDsl;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogicDsl;

impl WireFormat for SearchDsl {
    type Wire = SearchFilter;

    fn mode(&self) -> OutputMode {
        OutputMode::SearchDsl
    }

    fn forward(&self, tree: &FilterTree, schema: &SchemaConfig) -> Result<SearchFilter, FilterError> {
        to_search_filter(tree, schema)
    }

    fn reverse(&self, wire: &SearchFilter, schema: &SchemaConfig) -> Result<FilterTree, FilterError> {
        from_search_filter(wire, schema)
    }

    fn decode(&self, persisted: &str) -> Result<SearchFilter, FilterError> {
        SearchFilter::parse(persisted)
    }
}

impl WireFormat for LogicDsl {
    type Wire = LogicExpression;

    fn mode(&self) -> OutputMode {
        OutputMode::LogicExpression
    }

    fn forward(&self, tree: &FilterTree, schema: &SchemaConfig) -> Result<LogicExpression, FilterError> {
        to_logic_expression(tree, schema)
    }

    fn reverse(&self, wire: &LogicExpression, schema: &SchemaConfig) -> Result<FilterTree, FilterError> {
        from_logic_expression(wire, schema)
    }

    fn decode(&self, persisted: &str) -> Result<LogicExpression, FilterError> {
        LogicExpression::parse(persisted)
    }
}

/// Result of a forward translation: the value to persist, plus the search
/// filter itself when the instance feeds the count estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub persisted: PersistedValue,
    pub search: Option<SearchFilter>,
}

/// Strategy selected once per instance by `OutputMode`.
#[derive(Debug, Clone, Copy)]
pub enum Translator {
    Search(SearchDsl),
    Logic(LogicDsl),
}

impl Translator {
    pub fn for_mode(mode: OutputMode) -> Self {
        match mode {
            OutputMode::SearchDsl => Self::Search(SearchDsl),
            OutputMode::LogicExpression => Self::Logic(LogicDsl),
        }
    }

    pub fn mode(&self) -> OutputMode {
        match self {
            Self::Search(f) => f.mode(),
            Self::Logic(f) => f.mode(),
        }
    }

    pub fn to_persisted(&self, tree: &FilterTree, schema: &SchemaConfig) -> Result<Translated, FilterError> {
        match self {
            Self::Search(f) => {
                let wire = f.forward(tree, schema)?;
                Ok(Translated { persisted: f.encode(&wire)?, search: Some(wire) })
            }
            Self::Logic(f) => {
                let wire = f.forward(tree, schema)?;
                Ok(Translated { persisted: f.encode(&wire)?, search: None })
            }
        }
    }

    pub fn from_persisted(&self, persisted: &str, schema: &SchemaConfig) -> Result<FilterTree, FilterError> {
        match self {
            Self::Search(f) => f.reverse(&f.decode(persisted)?, schema),
            Self::Logic(f) => f.reverse(&f.decode(persisted)?, schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_short_and_long_names() {
        assert_eq!("search".parse::<OutputMode>().unwrap(), OutputMode::SearchDsl);
        assert_eq!("logic_expression".parse::<OutputMode>().unwrap(), OutputMode::LogicExpression);
        assert!("sql".parse::<OutputMode>().is_err());
    }

    #[test]
    fn translator_follows_mode() {
        for mode in [OutputMode::SearchDsl, OutputMode::LogicExpression] {
            assert_eq!(Translator::for_mode(mode).mode(), mode);
        }
    }

    #[test]
    fn logic_mode_has_no_search_filter() {
        let t = Translator::for_mode(OutputMode::LogicExpression)
            .to_persisted(&FilterTree::empty(), &SchemaConfig::new())
            .unwrap();
        assert!(t.search.is_none());
        assert_eq!(t.persisted.as_str(), r#"{"operator":"and","operands":[]}"#);
    }
}
