use restsum_protocol::{
    Endpoint, ErrorKind, MalformedFragment, Report, ReportEntry, ReportInput, RunCounters,
    RunStatus, SummaryResult, REPORT_SCHEMA_VERSION,
};
use std::collections::HashMap;

/// Inputs for assembling a report.
pub struct ReportParts {
    pub input: ReportInput,
    pub endpoints: Vec<Endpoint>,
    pub results: Vec<SummaryResult>,
    pub malformed: Vec<MalformedFragment>,
    pub candidates: usize,
    pub fragments: usize,
    pub deadline_exceeded: bool,
    pub version_tag: String,
    pub elapsed_ms: u64,
}

/// Pair every endpoint with its result in discovery order and decide the
/// run status. Results may arrive in any order.
pub fn build_report(parts: ReportParts, max_failure_ratio: f64) -> Report {
    let mut by_id: HashMap<String, SummaryResult> = HashMap::with_capacity(parts.results.len());
    for result in parts.results {
        by_id.entry(result.endpoint_id.clone()).or_insert(result);
    }

    let mut counters = RunCounters {
        candidates: parts.candidates,
        fragments: parts.fragments,
        malformed: parts.malformed.len(),
        ..RunCounters::default()
    };
    let mut entries = Vec::with_capacity(parts.endpoints.len());
    for endpoint in parts.endpoints {
        let result = by_id.get(&endpoint.id).cloned().unwrap_or_else(|| {
            SummaryResult::skipped(
                &endpoint.id,
                ErrorKind::Deadline,
                "no result produced for endpoint",
                0,
            )
        });
        counters.record(&result);
        entries.push(ReportEntry { endpoint, result });
    }

    let status = run_status(&counters, &entries, max_failure_ratio);
    Report {
        schema_version: REPORT_SCHEMA_VERSION,
        input: parts.input,
        status,
        counters,
        entries,
        malformed: parts.malformed,
        deadline_exceeded: parts.deadline_exceeded,
        version_tag: parts.version_tag,
        elapsed_ms: parts.elapsed_ms,
    }
}

fn run_status(counters: &RunCounters, entries: &[ReportEntry], max_failure_ratio: f64) -> RunStatus {
    if counters.total == 0 || counters.failure_ratio() > max_failure_ratio {
        return RunStatus::Failed;
    }
    let skipped_by_deadline = entries.iter().any(|entry| {
        entry
            .result
            .error
            .as_ref()
            .is_some_and(|err| err.kind == ErrorKind::Deadline)
    });
    if skipped_by_deadline {
        RunStatus::Partial
    } else {
        RunStatus::Success
    }
}
