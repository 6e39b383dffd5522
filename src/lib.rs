//! Query-tree translation and synchronization engine for interactive filter builders.
//!
//! A `FilterTree` is the single source of truth. `translate` maps it to and
//! from two wire formats (search-engine bool query, generic logic expression),
//! `estimate` keeps a debounced match count, `link` derives a shareable URL,
//! and `sync::SyncController` ties these together for one editor instance.

pub mod cli;
pub mod config;
pub mod errors;
pub mod estimate;
pub mod link;
pub mod schema;
pub mod sync;
pub mod translate;
pub mod tree;
pub mod utils;

pub use errors::{ErrorKind, FilterError};
pub use estimate::{CountEstimator, CountRequest, CountResult, CountService, CountStatus};
pub use link::LinkEncoder;
pub use schema::{DataType, FieldSpec, SchemaConfig, ValueWidget};
pub use sync::{PersistSink, SyncController, SyncFault, SyncState};
pub use translate::{LogicExpression, OutputMode, PersistedValue, SearchFilter, Translator};
pub use tree::{Combinator, FilterTree, Group, Node, Operator, Rule, TreeStore};
