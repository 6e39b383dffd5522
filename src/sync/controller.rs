use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::errors::FilterError;
use crate::estimate::{CountEstimator, CountService, CountStatus};
use crate::link::LinkEncoder;
use crate::schema::SchemaConfig;
use crate::translate::{OutputMode, PersistedValue, Translator};
use crate::tree::{FilterTree, TreeStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFault {
    LoadFailed,
    TranslateFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Ready,
    Translating,
    Error(SyncFault),
}

/// External holder of the persisted value (usually form state).
pub trait PersistSink: Send + Sync {
    fn persist(&self, value: &PersistedValue);
}

impl<F> PersistSink for F
where
    F: Fn(&PersistedValue) + Send + Sync,
{
    fn persist(&self, value: &PersistedValue) {
        self(value)
    }
}

/// Orchestrates edits, translation, persistence, counting and deep links.
///
/// The only writer of the tree store and of the persist sink. Translation
/// errors never escape: they become `SyncState::Error` plus `last_error()`,
/// and the sink keeps the last successfully translated value.
pub struct SyncController {
    schema: Arc<SchemaConfig>,
    translator: Translator,
    store: TreeStore,
    state: SyncState,
    last_error: Option<FilterError>,
    persisted: Option<PersistedValue>,
    link: LinkEncoder,
    deep_link: String,
    sink: Arc<dyn PersistSink>,
    estimator: Option<CountEstimator>,
}

impl SyncController {
    pub fn new(schema: Arc<SchemaConfig>, mode: OutputMode, sink: Arc<dyn PersistSink>) -> Self {
        let link = LinkEncoder::default();
        let deep_link = link.base_path().to_string();
        Self {
            schema,
            translator: Translator::for_mode(mode),
            store: TreeStore::default(),
            state: SyncState::Uninitialized,
            last_error: None,
            persisted: None,
            link,
            deep_link,
            sink,
            estimator: None,
        }
    }

    /// Build from configuration; the count service is only wired in search mode.
    pub fn from_config(
        schema: Arc<SchemaConfig>,
        mode: OutputMode,
        sink: Arc<dyn PersistSink>,
        service: Option<Arc<dyn CountService>>,
        cfg: &EngineConfig,
    ) -> Self {
        let mut ctl = Self::new(schema, mode, sink).with_link_encoder(cfg.link_encoder());
        if let Some(svc) = service {
            ctl = ctl.with_count_service(svc, cfg.debounce());
            if let Some(est) = ctl.estimator.take() {
                ctl.estimator = Some(est.with_track_total_hits(cfg.track_total_hits));
            }
        }
        ctl
    }

    pub fn with_link_encoder(mut self, link: LinkEncoder) -> Self {
        self.deep_link = link.base_path().to_string();
        self.link = link;
        self
    }

    pub fn with_count_service(mut self, service: Arc<dyn CountService>, debounce: Duration) -> Self {
        if self.translator.mode() == OutputMode::SearchDsl {
            self.estimator = Some(CountEstimator::new(service, debounce));
        } else {
            log::debug!("count service ignored outside search mode");
        }
        self
    }

    pub fn mode(&self) -> OutputMode {
        self.translator.mode()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_error(&self) -> Option<&FilterError> {
        self.last_error.as_ref()
    }

    pub fn tree(&self) -> &FilterTree {
        self.store.current()
    }

    pub fn previous_tree(&self) -> Option<&FilterTree> {
        self.store.previous()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Last value handed to the sink (or the initial value on a clean load).
    pub fn persisted(&self) -> Option<&PersistedValue> {
        self.persisted.as_ref()
    }

    pub fn deep_link(&self) -> &str {
        &self.deep_link
    }

    pub fn count_status(&self) -> CountStatus {
        self.estimator.as_ref().map(CountEstimator::status).unwrap_or_default()
    }

    pub fn subscribe_count(&self) -> Option<watch::Receiver<CountStatus>> {
        self.estimator.as_ref().map(CountEstimator::subscribe)
    }

    /// Seed the store from an optional persisted value. Runs once.
    pub fn mount(&mut self, initial: Option<&str>) {
        if self.state != SyncState::Uninitialized {
            log::warn!("mount ignored: controller already initialized");
            return;
        }
        let initial = initial.map(str::trim).filter(|s| !s.is_empty());
        let Some(raw) = initial else {
            self.state = SyncState::Ready;
            self.refresh_derived();
            return;
        };
        match self.translator.from_persisted(raw, &self.schema) {
            Ok(tree) => {
                log::info!("loaded {} filter with {} rule(s)", self.mode(), tree.rule_count());
                self.store = TreeStore::new(tree);
                self.persisted = Some(PersistedValue::new(raw));
                self.state = SyncState::Ready;
                self.refresh_derived();
            }
            Err(e) => {
                log::warn!("persisted {} filter could not be loaded: {e}", self.mode());
                self.store = TreeStore::default();
                self.state = SyncState::Error(SyncFault::LoadFailed);
                self.last_error = Some(FilterError::LoadFailed(e.to_string()));
                if let Some(est) = &self.estimator {
                    est.request(None);
                }
            }
        }
    }

    /// Accept a new tree from the editor.
    pub fn replace(&mut self, tree: FilterTree) {
        if self.state == SyncState::Uninitialized {
            self.mount(None);
        }
        self.store.replace(tree);
        self.state = SyncState::Translating;
        match self.translator.to_persisted(self.store.current(), &self.schema) {
            Ok(out) => {
                self.sink.persist(&out.persisted);
                self.persisted = Some(out.persisted);
                if let Some(est) = &self.estimator {
                    est.request(out.search.as_ref());
                }
                self.update_link();
                if self.last_error.take().is_some() {
                    log::info!("filter valid again at version {}", self.store.version());
                }
                self.state = SyncState::Ready;
            }
            Err(e) => {
                log::warn!("filter version {} not translated: {e}", self.store.version());
                if let Some(est) = &self.estimator {
                    est.request(None);
                }
                self.last_error = Some(e);
                self.state = SyncState::Error(SyncFault::TranslateFailed);
            }
        }
    }

    /// Apply an edit to the current tree. Only path errors from `edit` are returned;
    /// translation problems land in `state()`.
    pub fn edit<F>(&mut self, edit: F) -> Result<(), FilterError>
    where
        F: FnOnce(&FilterTree) -> Result<FilterTree, FilterError>,
    {
        let next = edit(self.store.current())?;
        self.replace(next);
        Ok(())
    }

    // Count and link for the current tree without emitting to the sink.
    fn refresh_derived(&mut self) {
        let search = match self.translator.to_persisted(self.store.current(), &self.schema) {
            Ok(out) => out.search,
            Err(e) => {
                log::warn!("loaded filter does not translate back: {e}");
                self.last_error = Some(e);
                self.state = SyncState::Error(SyncFault::TranslateFailed);
                None
            }
        };
        if let Some(est) = &self.estimator {
            est.request(search.as_ref());
        }
        if self.state == SyncState::Ready {
            self.update_link();
        }
    }

    fn update_link(&mut self) {
        match self.link.encode(self.store.current()) {
            Ok(link) => self.deep_link = link,
            Err(e) => log::warn!("deep link not updated: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldSpec};
    use crate::tree::{Node, Operator};
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn closure_sink_receives_each_translation() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |v: &PersistedValue| seen.lock().push(v.to_string())
        };
        let schema = SchemaConfig::new().with_field("owner", FieldSpec::new(DataType::Text));
        let mut ctl = SyncController::new(Arc::new(schema), OutputMode::SearchDsl, Arc::new(sink));
        ctl.edit(|t| t.with_inserted(&[], Node::rule("owner", Operator::IsNotEmpty, vec![])))
            .unwrap();
        ctl.edit(|t| t.with_replaced(&[0], Node::rule("owner", Operator::Equal, vec![json!("a")])))
            .unwrap();
        assert_eq!(ctl.state(), SyncState::Ready);
        assert_eq!(ctl.version(), 2);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[1], r#"{"query":{"bool":{"must":[{"term":{"owner":"a"}}]}}}"#);
    }

    #[test]
    fn without_runtime_count_stays_unknown() {
        let schema = SchemaConfig::new().with_field("owner", FieldSpec::new(DataType::Text));
        let svc: Arc<dyn CountService> = Arc::new(NeverCalled);
        let mut ctl = SyncController::new(Arc::new(schema), OutputMode::SearchDsl, Arc::new(|_: &PersistedValue| {}))
            .with_count_service(svc, Duration::from_millis(10));
        ctl.mount(Some(r#"{"query":{"exists":{"field":"owner"}}}"#));
        assert_eq!(ctl.state(), SyncState::Ready);
        assert_eq!(ctl.count_status(), CountStatus::default());
    }

    struct NeverCalled;

    #[async_trait::async_trait]
    impl CountService for NeverCalled {
        async fn count(&self, _: crate::estimate::CountRequest) -> Result<u64, FilterError> {
            unreachable!("no runtime, no request")
        }
    }
}
