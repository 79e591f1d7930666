use crate::{Endpoint, InputKind, SummaryResult, SummaryStatus};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Overall verdict of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// The run deadline elapsed and some endpoints were skipped.
    Partial,
    /// No endpoints were discovered or the failure ratio exceeded the threshold.
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::Partial => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunCounters {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cached: usize,
    /// Raw candidates before deduplication.
    pub candidates: usize,
    pub fragments: usize,
    pub malformed: usize,
}

impl RunCounters {
    pub fn record(&mut self, result: &SummaryResult) {
        self.total += 1;
        match result.status {
            SummaryStatus::Ok => {
                self.succeeded += 1;
                if result.from_cache {
                    self.cached += 1;
                }
            }
            SummaryStatus::Failed => self.failed += 1,
            SummaryStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failed as f64 / self.total as f64
    }
}

/// A fragment that could not be parsed at all; recorded and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MalformedFragment {
    pub location: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportEntry {
    pub endpoint: Endpoint,
    pub result: SummaryResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportInput {
    pub root: String,
    pub kind: InputKind,
}

/// Result of one run, entries in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub schema_version: u32,
    pub input: ReportInput,
    pub status: RunStatus,
    pub counters: RunCounters,
    pub entries: Vec<ReportEntry>,
    #[serde(default)]
    pub malformed: Vec<MalformedFragment>,
    pub deadline_exceeded: bool,
    /// Backend/model/prompt tag the summaries were produced with.
    pub version_tag: String,
    pub elapsed_ms: u64,
}

impl Report {
    pub fn results(&self) -> impl Iterator<Item = &SummaryResult> {
        self.entries.iter().map(|entry| &entry.result)
    }

    pub fn entry_for(&self, endpoint_id: &str) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|entry| entry.endpoint.id == endpoint_id)
    }
}

/// JSON Schema of [`Report`], printed by `restsum schema`.
pub fn report_json_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(Report);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}
