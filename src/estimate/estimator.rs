use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::translate::SearchFilter;

use super::types::{CountRequest, CountResult, CountService, CountStatus};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

const LOG_TARGET: &str = "filtersync::estimate";

#[derive(Default)]
struct EstimatorState {
    // bumped on every request(); only work tagged with the current value may publish
    latest_seq: u64,
    issued: u64,
    pending: Option<JoinHandle<()>>,
}

/// Debounced, sequence-checked count fetcher.
///
/// Each `request` restarts the debounce timer. When the timer fires the
/// request is sent; a response is applied only if no newer `request` has
/// happened since, so a slow old response never overwrites a newer one.
pub struct CountEstimator {
    service: Arc<dyn CountService>,
    debounce: Duration,
    track_total_hits: bool,
    state: Arc<Mutex<EstimatorState>>,
    status: Arc<watch::Sender<CountStatus>>,
}

impl CountEstimator {
    pub fn new(service: Arc<dyn CountService>, debounce: Duration) -> Self {
        let (tx, _rx) = watch::channel(CountStatus::default());
        Self {
            service,
            debounce,
            track_total_hits: true,
            state: Arc::new(Mutex::new(EstimatorState::default())),
            status: Arc::new(tx),
        }
    }

    pub fn with_track_total_hits(mut self, enabled: bool) -> Self {
        self.track_total_hits = enabled;
        self
    }

    pub fn status(&self) -> CountStatus {
        *self.status.borrow()
    }

    pub fn count(&self) -> CountResult {
        self.status().count
    }

    pub fn is_busy(&self) -> bool {
        self.status().busy
    }

    pub fn subscribe(&self) -> watch::Receiver<CountStatus> {
        self.status.subscribe()
    }

    /// Number of requests actually sent to the service.
    pub fn requests_issued(&self) -> u64 {
        self.state.lock().issued
    }

    /// Schedule a count for `filter`. `None` or a match-all filter cancels any
    /// pending work and reports `Unknown` without contacting the service.
    pub fn request(&self, filter: Option<&SearchFilter>) {
        let mut st = self.state.lock();
        if let Some(h) = st.pending.take() {
            h.abort();
        }
        st.latest_seq += 1;
        let seq = st.latest_seq;

        let Some(filter) = filter.filter(|f| !f.is_match_all()) else {
            log::debug!(target: LOG_TARGET, "count #{seq}: nothing to count");
            self.status.send_replace(CountStatus { count: CountResult::Unknown, busy: false });
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!(target: LOG_TARGET, "count #{seq}: no async runtime, estimate skipped");
            self.status.send_replace(CountStatus { count: CountResult::Unknown, busy: false });
            return;
        };

        self.status.send_replace(CountStatus { count: CountResult::Unknown, busy: true });
        let request = CountRequest::new(filter.clone(), self.track_total_hits);
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let status = Arc::clone(&self.status);
        let delay = self.debounce;
        st.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut st = state.lock();
                if st.latest_seq != seq {
                    return;
                }
                st.pending = None;
                st.issued += 1;
            }
            // detached: superseding this request only suppresses its result
            tokio::spawn(fetch(service, state, status, seq, request));
        }));
    }
}

async fn fetch(
    service: Arc<dyn CountService>,
    state: Arc<Mutex<EstimatorState>>,
    status: Arc<watch::Sender<CountStatus>>,
    seq: u64,
    request: CountRequest,
) {
    log::debug!(target: LOG_TARGET, "count #{seq}: issued");
    let outcome = service.count(request).await;
    let st = state.lock();
    if st.latest_seq != seq {
        log::debug!(target: LOG_TARGET, "count #{seq}: stale response discarded");
        return;
    }
    let count = match outcome {
        Ok(n) => {
            log::debug!(target: LOG_TARGET, "count #{seq}: {n} hits");
            CountResult::Known(n)
        }
        Err(e) => {
            log::warn!(target: LOG_TARGET, "count #{seq}: {e}");
            CountResult::Unknown
        }
    };
    status.send_replace(CountStatus { count, busy: false });
}

impl Drop for CountEstimator {
    fn drop(&mut self) {
        if let Some(h) = self.state.lock().pending.take() {
            h.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FilterError;
    use crate::translate::{Clause, SearchFilter};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{BTreeMap, VecDeque};

    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<CountRequest>>,
        // (delay ms, outcome) per call, in order
        script: Mutex<VecDeque<(u64, Result<u64, String>)>>,
    }

    impl Scripted {
        fn with(script: Vec<(u64, Result<u64, String>)>) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::default(), script: Mutex::new(script.into()) })
        }
    }

    #[async_trait]
    impl CountService for Scripted {
        async fn count(&self, request: CountRequest) -> Result<u64, FilterError> {
            self.calls.lock().push(request);
            let (delay, outcome) = self.script.lock().pop_front().unwrap_or((0, Ok(0)));
            tokio::time::sleep(Duration::from_millis(delay)).await;
            outcome.map_err(FilterError::CountFetchFailed)
        }
    }

    fn owner(name: &str) -> SearchFilter {
        SearchFilter { query: Clause::Term(BTreeMap::from([("owner".to_string(), json!(name))])) }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn edits_inside_window_coalesce_into_last_filter() {
        let svc = Scripted::with(vec![(10, Ok(7))]);
        let est = CountEstimator::new(svc.clone(), DEFAULT_DEBOUNCE);
        est.request(Some(&owner("a")));
        tokio::time::sleep(ms(100)).await;
        est.request(Some(&owner("b")));
        tokio::time::sleep(ms(50)).await;
        est.request(Some(&owner("c")));
        tokio::time::sleep(ms(1000)).await;

        let calls = svc.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filter, owner("c"));
        assert_eq!(est.status(), CountStatus { count: CountResult::Known(7), busy: false });
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_from_superseded_request_is_ignored() {
        // A is sent at 300ms and answers at 800ms; B is sent at 650ms and answers at 660ms
        let svc = Scripted::with(vec![(500, Ok(10)), (10, Ok(20))]);
        let est = CountEstimator::new(svc.clone(), DEFAULT_DEBOUNCE);
        est.request(Some(&owner("a")));
        tokio::time::sleep(ms(350)).await;
        est.request(Some(&owner("b")));
        tokio::time::sleep(ms(350)).await;
        assert_eq!(est.count(), CountResult::Known(20));
        tokio::time::sleep(ms(1000)).await;
        assert_eq!(est.count(), CountResult::Known(20));
        assert_eq!(est.requests_issued(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reports_unknown_without_retry() {
        let svc = Scripted::with(vec![(5, Err("backend down".into()))]);
        let est = CountEstimator::new(svc.clone(), DEFAULT_DEBOUNCE);
        est.request(Some(&owner("a")));
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(est.status(), CountStatus { count: CountResult::Unknown, busy: false });
        assert_eq!(svc.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn match_all_issues_nothing() {
        let svc = Scripted::with(vec![]);
        let est = CountEstimator::new(svc.clone(), DEFAULT_DEBOUNCE);
        est.request(Some(&SearchFilter::match_all()));
        est.request(None);
        tokio::time::sleep(ms(1000)).await;
        assert!(svc.calls.lock().is_empty());
        assert_eq!(est.status(), CountStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_while_debouncing_and_in_flight() {
        let svc = Scripted::with(vec![(200, Ok(3))]);
        let est = CountEstimator::new(svc.clone(), DEFAULT_DEBOUNCE);
        let mut rx = est.subscribe();
        est.request(Some(&owner("a")));
        assert!(est.is_busy());
        tokio::time::sleep(ms(400)).await;
        assert!(est.is_busy());
        rx.wait_for(|s| !s.busy).await.unwrap();
        assert_eq!(est.count(), CountResult::Known(3));
    }

    #[test]
    fn request_body_carries_tracking_flags() {
        let body = serde_json::to_value(CountRequest::new(owner("a"), true)).unwrap();
        assert_eq!(
            body,
            json!({"query":{"term":{"owner":"a"}},"from":0,"size":0,"track_total_hits":true})
        );
    }
}
