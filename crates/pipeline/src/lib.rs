//! # restsum pipeline
//!
//! One run, start to finish:
//!
//! ```text
//! root + kind ─► SourceReader ─► scan (Extractor) ─► Normalizer ─► Catalog
//!                                                                     │
//!            Report ◄── build_report ◄── Dispatcher (cache, backend) ◄┘
//! ```
//!
//! Reader failures (missing root, unknown kind) abort before any endpoint
//! work. Everything later is captured per fragment or per endpoint.

mod aggregate;
mod config;
mod error;

pub use aggregate::{build_report, ReportParts};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};

use restsum_cache::SummaryCache;
use restsum_catalog::{Catalog, Normalizer};
use restsum_dispatch::{DispatchConfig, Dispatcher, ProgressFn, SummaryBackend};
use restsum_extractor::{scan, SourceReader};
use restsum_protocol::{InputKind, MalformedFragment, Report, ReportInput};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Endpoints found under a root, before summarization.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub input: ReportInput,
    pub catalog: Catalog,
    pub malformed: Vec<MalformedFragment>,
    pub fragments: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    backend: Arc<dyn SummaryBackend>,
    cache: Arc<SummaryCache>,
    progress: Option<ProgressFn>,
}

impl Pipeline {
    /// Build a pipeline, opening the configured cache. A cache that cannot
    /// be opened is disabled for this run.
    pub fn new(config: PipelineConfig, backend: Arc<dyn SummaryBackend>) -> Result<Self> {
        config.validate()?;
        let cache = match &config.cache {
            Some(cache_config) => SummaryCache::open(cache_config),
            None => SummaryCache::disabled("caching turned off"),
        };
        Ok(Self {
            config,
            backend,
            cache: Arc::new(cache),
            progress: None,
        })
    }

    /// Share an already open cache instead of the configured one.
    pub fn with_cache(mut self, cache: Arc<SummaryCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    /// Read, extract and normalize. No backend calls.
    pub fn discover(&self, root: &Path, kind: &str) -> Result<Discovery> {
        discover(&self.config, root, kind)
    }

    /// Summarize a discovery and assemble the report.
    pub async fn summarize(&self, discovery: Discovery, started: Instant) -> Report {
        let dispatch_config: DispatchConfig = self.config.dispatch.clone();
        let mut dispatcher = Dispatcher::new(self.backend.clone(), self.cache.clone(), dispatch_config);
        if let Some(progress) = &self.progress {
            dispatcher = dispatcher.with_progress(progress.clone());
        }

        let Discovery {
            input,
            catalog,
            malformed,
            fragments,
        } = discovery;
        log::info!(
            "Summarizing {} endpoint(s) with {} (concurrency {})",
            catalog.len(),
            dispatcher.version_tag(),
            self.config.dispatch.concurrency
        );
        let outcome = dispatcher.dispatch(&catalog.endpoints, &catalog.skipped).await;

        let report = build_report(
            ReportParts {
                input,
                endpoints: catalog.endpoints,
                results: outcome.results,
                malformed,
                candidates: catalog.candidates,
                fragments,
                deadline_exceeded: outcome.deadline_exceeded,
                version_tag: dispatcher.version_tag().to_string(),
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
            self.config.max_failure_ratio,
        );
        log::info!(
            "Run finished: {:?} ({} ok, {} failed, {} skipped, {} cached)",
            report.status,
            report.counters.succeeded,
            report.counters.failed,
            report.counters.skipped,
            report.counters.cached
        );
        report
    }

    /// Full run: discover, then summarize.
    pub async fn run(&self, root: &Path, kind: &str) -> Result<Report> {
        let started = Instant::now();
        let discovery = self.discover(root, kind)?;
        Ok(self.summarize(discovery, started).await)
    }

    /// Close the cache at the end of a run, releasing its directory lock.
    ///
    /// Returns `false` when a handle passed to [`Pipeline::with_cache`] is
    /// still shared elsewhere; the owner of that handle closes it.
    pub fn finish(self) -> bool {
        match Arc::try_unwrap(self.cache) {
            Ok(cache) => {
                cache.close();
                true
            }
            Err(_) => {
                log::debug!("Summary cache still shared; leaving it open");
                false
            }
        }
    }
}

/// Extraction and normalization only.
pub fn discover(config: &PipelineConfig, root: &Path, kind: &str) -> Result<Discovery> {
    let reader = SourceReader::open(root, kind, config.scan.clone())?;
    let input = ReportInput {
        root: root.display().to_string(),
        kind: reader.kind(),
    };
    let outcome = scan(&reader, &config.extract);
    let catalog = Normalizer::new(config.normalizer).normalize(outcome.candidates);
    log::info!(
        "Discovered {} endpoint(s) from {} candidate(s) in {}",
        catalog.len(),
        catalog.candidates,
        root.display()
    );
    Ok(Discovery {
        input,
        catalog,
        malformed: outcome.malformed,
        fragments: outcome.fragments,
    })
}

/// Accepted spellings of every input kind, for help texts.
pub fn input_kinds() -> impl Iterator<Item = &'static str> {
    InputKind::ALL.iter().map(|kind| kind.as_str())
}
