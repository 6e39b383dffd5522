use crate::errors::FilterError;
use crate::tree::FilterTree;

pub const DEFAULT_EXPLORE_PATH: &str = "/explore";
pub const DEFAULT_LINK_PARAM: &str = "queryFilter";

/// Builds a shareable deep link carrying the tree as URL-encoded JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEncoder {
    base_path: String,
    param: String,
}

impl Default for LinkEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_EXPLORE_PATH, DEFAULT_LINK_PARAM)
    }
}

impl LinkEncoder {
    pub fn new(base_path: impl Into<String>, param: impl Into<String>) -> Self {
        Self { base_path: base_path.into(), param: param.into() }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `{base}?{param}={urlencoded tree json}`, or just `{base}` for an empty tree.
    pub fn encode(&self, tree: &FilterTree) -> Result<String, FilterError> {
        if tree.is_empty() {
            return Ok(self.base_path.clone());
        }
        let json = tree.to_json()?;
        let sep = if self.base_path.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{}{sep}{}={}",
            self.base_path,
            urlencoding::encode(&self.param),
            urlencoding::encode(&json)
        ))
    }

    /// Inverse of `encode`; `None` when the link carries no filter.
    pub fn decode(&self, link: &str) -> Result<Option<FilterTree>, FilterError> {
        let Some((_, query)) = link.split_once('?') else {
            return Ok(None);
        };
        let key = format!("{}=", urlencoding::encode(&self.param));
        let Some(raw) = query.split('&').find_map(|kv| kv.strip_prefix(key.as_str())) else {
            return Ok(None);
        };
        let json = urlencoding::decode(raw).map_err(|e| FilterError::LoadFailed(e.to_string()))?;
        Ok(Some(FilterTree::from_json(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Combinator, Group, Node, Operator};
    use serde_json::json;

    #[test]
    fn empty_tree_yields_bare_base_path() {
        assert_eq!(LinkEncoder::default().encode(&FilterTree::empty()).unwrap(), "/explore");
    }

    #[test]
    fn link_is_url_safe_and_reversible() {
        let t = FilterTree::empty()
            .with_inserted(&[], Node::rule("owner", Operator::Equal, vec![json!("alice & bob")]))
            .unwrap();
        let enc = LinkEncoder::default();
        let link = enc.encode(&t).unwrap();
        assert!(link.starts_with("/explore?queryFilter="));
        let fragment = link.trim_start_matches("/explore?queryFilter=");
        assert!(!fragment.contains(['{', '"', ' ', '&']));
        assert_eq!(enc.decode(&link).unwrap(), Some(t));
    }

    #[test]
    fn rule_free_negation_still_gets_a_fragment() {
        let t = FilterTree::new(Group::new(Combinator::Not, vec![Node::group(Combinator::And, vec![])]));
        let enc = LinkEncoder::default();
        let link = enc.encode(&t).unwrap();
        assert_ne!(link, "/explore");
        assert_eq!(enc.decode(&link).unwrap(), Some(t));
    }

    #[test]
    fn existing_query_string_is_extended() {
        let t = FilterTree::empty()
            .with_inserted(&[], Node::rule("owner", Operator::IsNotEmpty, vec![]))
            .unwrap();
        let link = LinkEncoder::new("/explore/tables?page=1", "queryFilter").encode(&t).unwrap();
        assert!(link.starts_with("/explore/tables?page=1&queryFilter="));
    }
}
