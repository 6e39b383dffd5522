mod controller;

pub use controller::{PersistSink, SyncController, SyncFault, SyncState};
