use crate::backend::{SummaryBackend, SummaryRequest};
use crate::error::BackendError;
use crate::limits::{ConcurrencyGate, ConcurrencySnapshot, Pacer, DEFAULT_CONCURRENCY};
use crate::prompt::{postprocess, DEFAULT_MAX_SUMMARY_CHARS};
use crate::retry::{RequestState, RetryPolicy};
use restsum_cache::{fingerprint, CacheEntry, SummaryCache};
use restsum_protocol::{Endpoint, ErrorKind, SummaryResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

pub const DEADLINE_MESSAGE: &str = "run deadline elapsed before the request finished";
pub const UNKNOWN_METHOD_MESSAGE: &str = "unknown HTTP method skipped by policy";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum requests awaiting the backend at once (clamped to 1..=32).
    pub concurrency: usize,
    /// Bound on a single backend call; zero disables it.
    pub request_timeout: Duration,
    /// Bound on the whole dispatch; `None` waits for every request.
    pub run_timeout: Option<Duration>,
    /// Minimum spacing between request starts; zero disables pacing.
    pub min_request_interval: Duration,
    pub max_summary_chars: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(30),
            run_timeout: None,
            min_request_interval: Duration::ZERO,
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// One result per input endpoint, in input order.
    pub results: Vec<SummaryResult>,
    pub deadline_exceeded: bool,
    pub concurrency: ConcurrencySnapshot,
}

/// Invoked once per finished result, in completion order.
pub type ProgressFn = Arc<dyn Fn(&SummaryResult) + Send + Sync>;

struct Shared {
    backend: Arc<dyn SummaryBackend>,
    cache: Arc<SummaryCache>,
    gate: ConcurrencyGate,
    pacer: Pacer,
    config: DispatchConfig,
    version_tag: String,
}

/// Fans endpoints out to the backend under a global concurrency ceiling.
pub struct Dispatcher {
    shared: Arc<Shared>,
    progress: Option<ProgressFn>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn SummaryBackend>,
        cache: Arc<SummaryCache>,
        config: DispatchConfig,
    ) -> Self {
        let version_tag = backend.version_tag();
        Self {
            shared: Arc::new(Shared {
                gate: ConcurrencyGate::new(config.concurrency),
                pacer: Pacer::new(config.min_request_interval),
                backend,
                cache,
                config,
                version_tag,
            }),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn version_tag(&self) -> &str {
        &self.shared.version_tag
    }

    pub fn concurrency_snapshot(&self) -> ConcurrencySnapshot {
        self.shared.gate.snapshot()
    }

    /// Summarize every endpoint. Per-endpoint failures are captured in the
    /// results; this never fails as a whole.
    pub async fn dispatch(
        &self,
        endpoints: &[Endpoint],
        skipped_ids: &BTreeSet<String>,
    ) -> DispatchOutcome {
        let deadline = self.shared.config.run_timeout.map(|t| Instant::now() + t);
        let mut slots: Vec<Option<SummaryResult>> = vec![None; endpoints.len()];
        let mut attempts: Vec<Arc<AtomicU32>> = Vec::with_capacity(endpoints.len());
        let mut first_index: HashMap<&str, usize> = HashMap::new();
        let mut duplicates: Vec<(usize, usize)> = Vec::new();
        let mut set: JoinSet<(usize, SummaryResult)> = JoinSet::new();

        for (idx, endpoint) in endpoints.iter().enumerate() {
            attempts.push(Arc::new(AtomicU32::new(0)));
            if let Some(&first) = first_index.get(endpoint.id.as_str()) {
                duplicates.push((idx, first));
                continue;
            }
            first_index.insert(endpoint.id.as_str(), idx);

            if skipped_ids.contains(&endpoint.id) {
                let result =
                    SummaryResult::skipped(&endpoint.id, ErrorKind::UnknownMethod, UNKNOWN_METHOD_MESSAGE, 0);
                self.finish(&mut slots, idx, result);
                continue;
            }

            let fp = fingerprint(&endpoint.id, &self.shared.version_tag);
            if let Some(entry) = self.shared.cache.get(&fp).await {
                log::debug!("Cache hit for {} {}", endpoint.method, endpoint.display_path);
                self.finish(&mut slots, idx, SummaryResult::cached(&endpoint.id, entry.summary));
                continue;
            }

            let request = SummaryRequest::for_endpoint(endpoint, self.shared.config.max_summary_chars);
            let shared = self.shared.clone();
            let counter = attempts[idx].clone();
            set.spawn(async move {
                let result = run_request(&shared, request, &counter).await;
                (idx, result)
            });
        }

        let mut deadline_exceeded = false;
        loop {
            let joined = match deadline {
                Some(deadline) => tokio::select! {
                    biased;
                    joined = set.join_next() => joined,
                    () = tokio::time::sleep_until(deadline) => {
                        deadline_exceeded = !set.is_empty();
                        break;
                    }
                },
                None => set.join_next().await,
            };
            let Some(joined) = joined else { break };
            match joined {
                Ok((idx, result)) => self.finish(&mut slots, idx, result),
                Err(err) => log::warn!("Summary task ended abnormally: {err}"),
            }
        }

        if deadline_exceeded {
            log::warn!(
                "Run deadline elapsed with {} request(s) outstanding; cancelling",
                set.len()
            );
            set.abort_all();
        }
        // Drain so no task outlives the dispatch; results that raced the
        // abort still count.
        while let Some(joined) = set.join_next().await {
            if let Ok((idx, result)) = joined {
                self.finish(&mut slots, idx, result);
            }
        }

        for (idx, endpoint) in endpoints.iter().enumerate() {
            if slots[idx].is_some() || first_index.get(endpoint.id.as_str()) != Some(&idx) {
                continue;
            }
            let made = attempts[idx].load(Ordering::SeqCst);
            let result = if deadline_exceeded {
                SummaryResult::skipped(&endpoint.id, ErrorKind::Deadline, DEADLINE_MESSAGE, made)
            } else {
                SummaryResult::failed(
                    &endpoint.id,
                    ErrorKind::PermanentBackend,
                    "summary task aborted",
                    made,
                )
            };
            self.finish(&mut slots, idx, result);
        }

        for (idx, first) in duplicates {
            if let Some(result) = slots[first].clone() {
                self.finish(&mut slots, idx, result);
            }
        }

        DispatchOutcome {
            results: slots.into_iter().flatten().collect(),
            deadline_exceeded,
            concurrency: self.shared.gate.snapshot(),
        }
    }

    fn finish(&self, slots: &mut [Option<SummaryResult>], idx: usize, result: SummaryResult) {
        if let Some(progress) = &self.progress {
            progress(&result);
        }
        slots[idx] = Some(result);
    }
}

async fn run_request(
    shared: &Shared,
    request: SummaryRequest,
    attempts: &AtomicU32,
) -> SummaryResult {
    let config = &shared.config;
    let mut state = RequestState::Pending;

    while !state.is_terminal() {
        if let RequestState::Retrying { attempt, delay } = &state {
            log::debug!(
                "Retrying {} {} (attempt {}/{}) in {:?}",
                request.method,
                request.path,
                attempt + 1,
                config.retry.max_retries + 1,
                delay
            );
            tokio::time::sleep(*delay).await;
        }

        shared.pacer.wait().await;
        let Some(permit) = shared.gate.acquire().await else {
            state = state.skip();
            break;
        };
        let outcome = call_backend(shared, &request).await;
        drop(permit);

        state = state.advance(outcome, &config.retry);
        attempts.store(state.attempts(), Ordering::SeqCst);
    }

    match state {
        RequestState::Succeeded { text, attempts } => {
            if shared.cache.is_enabled() {
                let entry = CacheEntry::new(&request.endpoint_id, &shared.version_tag, &text);
                if let Err(err) = shared.cache.put(&entry).await {
                    log::warn!("Failed to cache summary for {}: {err}", request.path);
                }
            }
            SummaryResult::generated(request.endpoint_id, text, attempts)
        }
        RequestState::Failed { error, attempts } => {
            log::warn!(
                "Summary failed for {} {} after {attempts} attempt(s): {error}",
                request.method,
                request.path
            );
            SummaryResult::failed(request.endpoint_id, error.kind(), error.message(), attempts)
        }
        other => SummaryResult::skipped(
            request.endpoint_id,
            ErrorKind::Deadline,
            DEADLINE_MESSAGE,
            other.attempts(),
        ),
    }
}

async fn call_backend(shared: &Shared, request: &SummaryRequest) -> Result<String, BackendError> {
    let timeout = shared.config.request_timeout;
    let raw = if timeout.is_zero() {
        shared.backend.summarize(request).await?
    } else {
        match tokio::time::timeout(timeout, shared.backend.summarize(request)).await {
            Ok(answer) => answer?,
            Err(_) => {
                return Err(BackendError::transient(format!(
                    "request timed out after {timeout:?}"
                )))
            }
        }
    };
    postprocess(&raw, shared.config.max_summary_chars)
        .ok_or_else(|| BackendError::permanent("empty answer"))
}
