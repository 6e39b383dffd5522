use std::sync::Arc;

use crate::errors::FilterError;

use super::types::{Combinator, FilterTree, Group, Node};

// Rebuilds the spine from the root down to the group at `path`; siblings are
// shared by pointer with the source tree.
fn edit_group<F>(group: &Group, path: &[usize], full: &[usize], f: F) -> Result<Group, FilterError>
where
    F: FnOnce(&Group) -> Result<Group, FilterError>,
{
    let Some((&idx, rest)) = path.split_first() else {
        return f(group);
    };
    let child = group.children.get(idx).ok_or_else(|| FilterError::InvalidPath(full.to_vec()))?;
    let Node::Group(sub) = child.as_ref() else {
        return Err(FilterError::InvalidPath(full.to_vec()));
    };
    let rebuilt = edit_group(sub, rest, full, f)?;
    let mut children = group.children.clone();
    children[idx] = Arc::new(Node::Group(rebuilt));
    Ok(Group { combinator: group.combinator, children })
}

fn split_node_path(path: &[usize]) -> Result<(&[usize], usize), FilterError> {
    match path.split_last() {
        Some((&last, parent)) => Ok((parent, last)),
        None => Err(FilterError::InvalidPath(Vec::new())),
    }
}

impl FilterTree {
    /// Look up the node at `path`; the empty path names the root group and has no node.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut cur = self.root.children.get(*first)?.as_ref();
        for idx in rest {
            match cur {
                Node::Group(g) => cur = g.children.get(*idx)?.as_ref(),
                Node::Rule(_) => return None,
            }
        }
        Some(cur)
    }

    /// Append `node` to the group at `group_path`.
    pub fn with_inserted(&self, group_path: &[usize], node: Node) -> Result<Self, FilterError> {
        let root = edit_group(&self.root, group_path, group_path, |g| {
            let mut children = g.children.clone();
            children.push(Arc::new(node));
            Ok(Group { combinator: g.combinator, children })
        })?;
        Ok(Self::new(root))
    }

    pub fn with_removed(&self, node_path: &[usize]) -> Result<Self, FilterError> {
        let (parent, idx) = split_node_path(node_path)?;
        let root = edit_group(&self.root, parent, node_path, |g| {
            if idx >= g.children.len() {
                return Err(FilterError::InvalidPath(node_path.to_vec()));
            }
            let mut children = g.children.clone();
            children.remove(idx);
            Ok(Group { combinator: g.combinator, children })
        })?;
        Ok(Self::new(root))
    }

    pub fn with_replaced(&self, node_path: &[usize], node: Node) -> Result<Self, FilterError> {
        let (parent, idx) = split_node_path(node_path)?;
        let root = edit_group(&self.root, parent, node_path, |g| {
            if idx >= g.children.len() {
                return Err(FilterError::InvalidPath(node_path.to_vec()));
            }
            let mut children = g.children.clone();
            children[idx] = Arc::new(node);
            Ok(Group { combinator: g.combinator, children })
        })?;
        Ok(Self::new(root))
    }

    pub fn with_combinator(
        &self,
        group_path: &[usize],
        combinator: Combinator,
    ) -> Result<Self, FilterError> {
        let root = edit_group(&self.root, group_path, group_path, |g| {
            Ok(Group { combinator, children: g.children.clone() })
        })?;
        Ok(Self::new(root))
    }
}
