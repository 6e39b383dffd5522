#![allow(dead_code)]
// Shared fixtures for the integration suites.

use async_trait::async_trait;
use filtersync::{CountRequest, CountService, FilterError, PersistSink, PersistedValue, SchemaConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub fn schema() -> SchemaConfig {
    SchemaConfig::from_json(
        r#"{"fields":{
            "owner":{"type":"text"},
            "tier":{"type":"select"},
            "rows":{"type":"number"},
            "updated":{"type":"date"},
            "deleted":{"type":"boolean"},
            "tags":{"type":"multi_select"}
        }}"#,
    )
    .unwrap()
}

pub fn schema_without(field: &str) -> SchemaConfig {
    let full = schema();
    full.field_ids().filter(|id| *id != field).fold(SchemaConfig::new(), |s, id| {
        s.with_field(id, full.field(id).cloned().expect("listed field"))
    })
}

#[derive(Default)]
pub struct RecordingSink {
    pub values: Mutex<Vec<PersistedValue>>,
}

impl PersistSink for RecordingSink {
    fn persist(&self, value: &PersistedValue) {
        self.values.lock().push(value.clone());
    }
}

impl RecordingSink {
    pub fn last(&self) -> Option<PersistedValue> {
        self.values.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }
}

/// Count service answering from a script of (delay ms, outcome) per call.
#[derive(Default)]
pub struct ScriptedCounts {
    pub calls: Mutex<Vec<CountRequest>>,
    script: Mutex<VecDeque<(u64, Result<u64, String>)>>,
}

impl ScriptedCounts {
    pub fn new(script: Vec<(u64, Result<u64, String>)>) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::default(), script: Mutex::new(script.into()) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CountService for ScriptedCounts {
    async fn count(&self, request: CountRequest) -> Result<u64, FilterError> {
        self.calls.lock().push(request);
        let (delay, outcome) = self.script.lock().pop_front().unwrap_or((0, Ok(0)));
        tokio::time::sleep(Duration::from_millis(delay)).await;
        outcome.map_err(FilterError::CountFetchFailed)
    }
}
