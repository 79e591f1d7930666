//! Offline deterministic backend for tests and dry runs.

use crate::backend::{SummaryBackend, SummaryRequest};
use crate::error::Result;
use async_trait::async_trait;
use restsum_protocol::HttpMethod;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const STUB_MODEL: &str = "heuristic";

#[derive(Debug, Default)]
pub struct StubBackend {
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before every answer, to exercise deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency).filter(|d| !d.is_zero());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        STUB_MODEL
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(stub_summary(request.method, &request.path))
    }
}

/// Summary derived from method and path alone.
pub fn stub_summary(method: HttpMethod, path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let trailing_param = segments
        .last()
        .filter(|s| s.starts_with('{'))
        .map(|s| s.trim_matches(|c| c == '{' || c == '}'));
    let resource = segments
        .iter()
        .rev()
        .find(|s| !s.starts_with('{'))
        .map_or("root", |s| *s);

    match (method, trailing_param) {
        (HttpMethod::Get, Some(param)) => format!("Retrieves {resource} by {param}"),
        (HttpMethod::Get, None) => format!("Lists {resource}"),
        (HttpMethod::Post, _) => format!("Creates {resource}"),
        (HttpMethod::Put | HttpMethod::Patch, _) => format!("Updates {resource}"),
        (HttpMethod::Delete, _) => format!("Deletes {resource}"),
        (other, _) => format!("Handles {other} {path}"),
    }
}
