mod estimator;
mod types;

pub use estimator::{CountEstimator, DEFAULT_DEBOUNCE};
pub use types::{CountRequest, CountResult, CountService, CountStatus};
