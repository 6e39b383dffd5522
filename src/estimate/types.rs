use async_trait::async_trait;
use serde::Serialize;

use crate::errors::FilterError;
use crate::translate::SearchFilter;

/// Approximate match count; `Unknown` while pending, after a failure, or
/// when there is nothing to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountResult {
    #[default]
    Unknown,
    Known(u64),
}

impl CountResult {
    pub fn value(self) -> Option<u64> {
        match self {
            Self::Known(n) => Some(n),
            Self::Unknown => None,
        }
    }
}

/// What a consumer renders: the count plus a loading flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountStatus {
    pub count: CountResult,
    pub busy: bool,
}

/// Body sent to the count service: the filter plus pagination/tracking flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountRequest {
    #[serde(flatten)]
    pub filter: SearchFilter,
    pub from: usize,
    pub size: usize,
    pub track_total_hits: bool,
}

impl CountRequest {
    pub fn new(filter: SearchFilter, track_total_hits: bool) -> Self {
        Self { filter, from: 0, size: 0, track_total_hits }
    }
}

/// Backend that returns total hits for a query. Latency and failure are expected.
#[async_trait]
pub trait CountService: Send + Sync + 'static {
    async fn count(&self, request: CountRequest) -> Result<u64, FilterError>;
}
