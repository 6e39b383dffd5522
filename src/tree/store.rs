use super::types::FilterTree;

/// Single authoritative holder of the current tree. No validation happens here.
#[derive(Debug, Default)]
pub struct TreeStore {
    current: FilterTree,
    previous: Option<FilterTree>,
    version: u64,
}

impl TreeStore {
    pub fn new(initial: FilterTree) -> Self {
        Self { current: initial, previous: None, version: 0 }
    }

    pub fn current(&self) -> &FilterTree {
        &self.current
    }

    /// The tree that was current before the last `replace`.
    pub fn previous(&self) -> Option<&FilterTree> {
        self.previous.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn replace(&mut self, tree: FilterTree) {
        let old = std::mem::replace(&mut self.current, tree);
        self.previous = Some(old);
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, Operator};
    use serde_json::json;

    #[test]
    fn replace_keeps_previous_and_bumps_version() {
        let mut s = TreeStore::default();
        assert_eq!(s.version(), 0);
        assert!(s.previous().is_none());
        let next = FilterTree::empty()
            .with_inserted(&[], Node::rule("owner", Operator::Equal, vec![json!("alice")]))
            .unwrap();
        s.replace(next.clone());
        assert_eq!(s.version(), 1);
        assert_eq!(s.current(), &next);
        assert_eq!(s.previous(), Some(&FilterTree::empty()));
    }
}
