// Submodules for separation of concerns
mod edit;
mod eval;
mod store;
mod types;

pub use eval::eval_tree;
pub use store::TreeStore;
pub use types::{Arity, Combinator, FilterTree, Group, Node, Operator, Rule};
pub(crate) use types::MAX_TREE_DEPTH;
