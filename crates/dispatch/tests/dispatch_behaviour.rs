use async_trait::async_trait;
use pretty_assertions::assert_eq;
use restsum_cache::{CacheConfig, SummaryCache};
use restsum_dispatch::{
    BackendError, DispatchConfig, Dispatcher, RetryPolicy, SummaryBackend, SummaryRequest,
};
use restsum_protocol::{Endpoint, ErrorKind, HttpMethod, SummaryResult, SummaryStatus};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend double that records concurrency and scripts failures per endpoint.
#[derive(Default)]
struct FakeBackend {
    latency: Duration,
    latency_by_id: HashMap<String, Duration>,
    permanent: HashSet<String>,
    transient_calls: HashMap<String, u32>,
    blank: HashSet<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeBackend {
    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn total_calls(&self) -> u32 {
        self.calls.lock().expect("calls lock").values().sum()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String, BackendError> {
        let call = {
            let mut calls = self.calls.lock().expect("calls lock");
            let entry = calls.entry(request.endpoint_id.clone()).or_default();
            *entry += 1;
            *entry
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let latency = self
            .latency_by_id
            .get(&request.endpoint_id)
            .copied()
            .unwrap_or(self.latency);
        tokio::time::sleep(latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.permanent.contains(&request.endpoint_id) {
            return Err(BackendError::permanent("HTTP 400: rejected"));
        }
        if let Some(&failing) = self.transient_calls.get(&request.endpoint_id) {
            if call <= failing {
                return Err(BackendError::transient("HTTP 429: slow down"));
            }
        }
        if self.blank.contains(&request.endpoint_id) {
            return Ok("   \n".to_string());
        }
        Ok(format!("Summary of {} {}", request.method, request.path))
    }
}

fn endpoints(count: usize) -> Vec<Endpoint> {
    (0..count)
        .map(|n| Endpoint {
            id: format!("id{n:02}"),
            method: HttpMethod::Get,
            path_template: format!("/r{n}"),
            display_path: format!("/r{n}"),
            parameters: vec![],
            occurrences: 1,
            handlers: vec![],
            sources: vec![],
            frameworks: vec![],
            context: None,
            warnings: vec![],
        })
        .collect()
}

fn config(concurrency: usize) -> DispatchConfig {
    DispatchConfig {
        concurrency,
        retry: RetryPolicy::default()
            .without_jitter()
            .with_initial_delay(Duration::from_millis(10)),
        ..DispatchConfig::default()
    }
}

fn memory_cache() -> Arc<SummaryCache> {
    Arc::new(SummaryCache::open(&CacheConfig::memory()))
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_concurrency_limit() {
    let backend = Arc::new(FakeBackend::default().with_latency(Duration::from_millis(50)));
    let dispatcher = Dispatcher::new(backend.clone(), memory_cache(), config(3));

    let outcome = dispatcher.dispatch(&endpoints(20), &BTreeSet::new()).await;

    assert_eq!(outcome.results.len(), 20);
    assert!(outcome.results.iter().all(|r| r.is_ok()));
    assert!(backend.peak() <= 3, "peak {} exceeded limit", backend.peak());
    assert_eq!(backend.peak(), 3);
    assert!(outcome.concurrency.peak <= 3);
    assert_eq!(outcome.concurrency.in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn one_permanent_failure_leaves_the_rest_ok() {
    let mut fake = FakeBackend::default().with_latency(Duration::from_millis(5));
    fake.permanent.insert("id03".to_string());
    let backend = Arc::new(fake);
    let dispatcher = Dispatcher::new(backend.clone(), memory_cache(), config(4));

    let outcome = dispatcher.dispatch(&endpoints(6), &BTreeSet::new()).await;

    let ok = outcome.results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 5);
    let failed = &outcome.results[3];
    assert_eq!(failed.status, SummaryStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert_eq!(
        failed.error.as_ref().map(|e| e.kind),
        Some(ErrorKind::PermanentBackend)
    );
    assert!(!outcome.deadline_exceeded);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let mut fake = FakeBackend::default();
    fake.transient_calls.insert("id00".to_string(), 2);
    fake.transient_calls.insert("id01".to_string(), u32::MAX);
    let backend = Arc::new(fake);
    let mut cfg = config(2);
    cfg.retry = cfg.retry.with_max_retries(2);
    let dispatcher = Dispatcher::new(backend.clone(), memory_cache(), cfg);

    let outcome = dispatcher.dispatch(&endpoints(2), &BTreeSet::new()).await;

    let recovered = &outcome.results[0];
    assert!(recovered.is_ok());
    assert_eq!(recovered.attempts, 3);
    assert_eq!(recovered.summary.as_deref(), Some("Summary of GET /r0"));

    let exhausted = &outcome.results[1];
    assert_eq!(exhausted.status, SummaryStatus::Failed);
    assert_eq!(exhausted.attempts, 3);
    assert_eq!(
        exhausted.error.as_ref().map(|e| e.kind),
        Some(ErrorKind::TransientBackend)
    );
}

#[tokio::test(start_paused = true)]
async fn slow_requests_time_out_as_transient() {
    let backend = Arc::new(FakeBackend::default().with_latency(Duration::from_secs(5)));
    let mut cfg = config(1);
    cfg.request_timeout = Duration::from_secs(1);
    cfg.retry = cfg.retry.with_max_retries(1);
    let dispatcher = Dispatcher::new(backend, memory_cache(), cfg);

    let outcome = dispatcher.dispatch(&endpoints(1), &BTreeSet::new()).await;

    let result = &outcome.results[0];
    assert_eq!(result.status, SummaryStatus::Failed);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.error.as_ref().map(|e| e.kind), Some(ErrorKind::TransientBackend));
}

#[tokio::test(start_paused = true)]
async fn blank_answer_fails_without_retry() {
    let mut fake = FakeBackend::default();
    fake.blank.insert("id00".to_string());
    let backend = Arc::new(fake);
    let dispatcher = Dispatcher::new(backend.clone(), memory_cache(), config(1));

    let outcome = dispatcher.dispatch(&endpoints(1), &BTreeSet::new()).await;

    let result = &outcome.results[0];
    assert_eq!(result.status, SummaryStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(backend.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_skips_pending_requests_without_hanging() {
    let backend = Arc::new(FakeBackend::default().with_latency(Duration::from_secs(10)));
    let mut cfg = config(2);
    cfg.run_timeout = Some(Duration::from_secs(1));
    let dispatcher = Dispatcher::new(backend, memory_cache(), cfg);

    let outcome = dispatcher.dispatch(&endpoints(5), &BTreeSet::new()).await;

    assert!(outcome.deadline_exceeded);
    assert_eq!(outcome.results.len(), 5);
    for result in &outcome.results {
        assert_eq!(result.status, SummaryStatus::Skipped);
        assert_eq!(result.error.as_ref().map(|e| e.kind), Some(ErrorKind::Deadline));
    }
}

#[tokio::test(start_paused = true)]
async fn results_follow_input_order_not_completion_order() {
    let mut fake = FakeBackend::default();
    for n in 0..5u64 {
        fake.latency_by_id
            .insert(format!("id{n:02}"), Duration::from_millis(100 - n * 20));
    }
    let dispatcher = Dispatcher::new(Arc::new(fake), memory_cache(), config(5));
    let input = endpoints(5);

    let outcome = dispatcher.dispatch(&input, &BTreeSet::new()).await;

    let ids: Vec<&str> = outcome.results.iter().map(|r| r.endpoint_id.as_str()).collect();
    let expected: Vec<&str> = input.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(start_paused = true)]
async fn warm_cache_answers_every_endpoint() {
    let backend = Arc::new(FakeBackend::default());
    let cache = memory_cache();
    let input = endpoints(4);

    let first = Dispatcher::new(backend.clone(), cache.clone(), config(2))
        .dispatch(&input, &BTreeSet::new())
        .await;
    assert!(first.results.iter().all(|r| r.is_ok() && !r.from_cache));
    assert_eq!(backend.total_calls(), 4);

    let second = Dispatcher::new(backend.clone(), cache, config(2))
        .dispatch(&input, &BTreeSet::new())
        .await;
    assert!(second.results.iter().all(|r| r.from_cache));
    assert_eq!(backend.total_calls(), 4);

    let summaries = |o: &restsum_dispatch::DispatchOutcome| -> Vec<Option<String>> {
        o.results.iter().map(|r| r.summary.clone()).collect()
    };
    assert_eq!(summaries(&first), summaries(&second));
}

#[tokio::test]
async fn policy_skips_and_duplicates_share_one_call() {
    let backend = Arc::new(FakeBackend::default());
    let mut input = endpoints(3);
    input.push(input[0].clone());
    let skipped: BTreeSet<String> = ["id02".to_string()].into_iter().collect();
    let progress_calls = Arc::new(AtomicUsize::new(0));
    let counter = progress_calls.clone();

    let outcome = Dispatcher::new(backend.clone(), memory_cache(), config(2))
        .with_progress(Arc::new(move |_: &SummaryResult| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .dispatch(&input, &skipped)
        .await;

    assert_eq!(outcome.results.len(), 4);
    assert_eq!(outcome.results[2].status, SummaryStatus::Skipped);
    assert_eq!(
        outcome.results[2].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::UnknownMethod)
    );
    assert_eq!(outcome.results[3], outcome.results[0]);
    assert_eq!(backend.total_calls(), 2);
    assert_eq!(progress_calls.load(Ordering::SeqCst), 4);
}
