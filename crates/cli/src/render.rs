use console::{pad_str, style, Alignment, StyledObject};
use restsum_protocol::{
    Endpoint, HttpMethod, Report, ReportEntry, RunStatus, SummaryResult, SummaryStatus,
};
use std::collections::BTreeMap;
use std::fmt::Write as _;

const MAX_PATH_WIDTH: usize = 48;
const MAX_SOURCE_WIDTH: usize = 36;

fn method_style(method: HttpMethod) -> StyledObject<&'static str> {
    let label = style(method.as_str());
    match method {
        HttpMethod::Get => label.green(),
        HttpMethod::Post => label.blue(),
        HttpMethod::Put => label.yellow(),
        HttpMethod::Delete => label.red(),
        HttpMethod::Patch => label.magenta(),
        HttpMethod::Unknown => label.dim(),
        _ => label,
    }
}

/// Long paths keep their last two components.
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 3 {
        format!(".../{}", parts[parts.len() - 2..].join("/"))
    } else {
        path.to_string()
    }
}

fn primary_source(endpoint: &Endpoint) -> String {
    endpoint
        .sources
        .first()
        .map(|source| match source.line {
            Some(line) => format!("{}:{line}", shorten_path(&source.file)),
            None => shorten_path(&source.file),
        })
        .unwrap_or_default()
}

fn summary_cell(result: Option<&SummaryResult>) -> String {
    let Some(result) = result else {
        return String::new();
    };
    match result.status {
        SummaryStatus::Ok => {
            let text = result.summary.clone().unwrap_or_default();
            if result.from_cache {
                format!("{text} {}", style("(cached)").dim())
            } else {
                text
            }
        }
        SummaryStatus::Failed | SummaryStatus::Skipped => {
            let label = if result.status == SummaryStatus::Failed {
                style("failed").red()
            } else {
                style("skipped").yellow()
            };
            match &result.error {
                Some(err) => format!("{label}: {}", err.message),
                None => label.to_string(),
            }
        }
    }
}

/// Endpoint table followed by a per-file grouping.
pub(crate) fn render_table<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (&'a Endpoint, Option<&'a SummaryResult>)>,
{
    let rows: Vec<(&Endpoint, Option<&SummaryResult>)> = rows.into_iter().collect();
    let mut out = String::new();
    if rows.is_empty() {
        let _ = writeln!(out, "{}", style("No endpoints found.").yellow());
        return out;
    }

    let _ = writeln!(out, "{}", style("REST API Endpoints").green().bold());
    let _ = writeln!(out, "Found {} endpoints\n", rows.len());

    let path_width = rows
        .iter()
        .map(|(e, _)| e.display_path.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(4, MAX_PATH_WIDTH);
    let sources: Vec<String> = rows.iter().map(|(e, _)| primary_source(e)).collect();
    let source_width = sources
        .iter()
        .map(|s| s.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(6, MAX_SOURCE_WIDTH);

    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        style(pad_str("METHOD", 7, Alignment::Left, None)).cyan(),
        style(pad_str("PATH", path_width, Alignment::Left, None)).cyan(),
        style(pad_str("SOURCE", source_width, Alignment::Left, None)).cyan(),
        style("SUMMARY").cyan(),
    );
    for ((endpoint, result), source) in rows.iter().zip(&sources) {
        let method = method_style(endpoint.method).to_string();
        let _ = writeln!(
            out,
            "{}  {}  {}  {}",
            pad_str(&method, 7, Alignment::Left, None),
            pad_str(&endpoint.display_path, path_width, Alignment::Left, Some("...")),
            pad_str(source, source_width, Alignment::Left, Some("...")),
            summary_cell(*result),
        );
        for warning in &endpoint.warnings {
            let _ = writeln!(out, "         {} {warning}", style("warning:").yellow());
        }
    }

    let mut by_file: BTreeMap<&str, Vec<&Endpoint>> = BTreeMap::new();
    for (endpoint, _) in &rows {
        let file = endpoint
            .sources
            .first()
            .map_or("<unknown>", |s| s.file.as_str());
        by_file.entry(file).or_default().push(*endpoint);
    }
    let _ = writeln!(out, "\n{}", style("Endpoints by file:").green());
    for (file, endpoints) in by_file {
        let _ = writeln!(out, "  {} ({} endpoints)", style(file).cyan(), endpoints.len());
        for endpoint in endpoints {
            let _ = writeln!(
                out,
                "    • {} {}",
                method_style(endpoint.method),
                endpoint.display_path
            );
        }
    }
    out
}

pub(crate) fn render_report(report: &Report) -> String {
    let mut out = render_table(
        report
            .entries
            .iter()
            .map(|ReportEntry { endpoint, result }| (endpoint, Some(result))),
    );

    if !report.malformed.is_empty() {
        let _ = writeln!(
            out,
            "\n{} {} fragment(s) could not be parsed:",
            style("warning:").yellow(),
            report.malformed.len()
        );
        for fragment in &report.malformed {
            let _ = writeln!(out, "  {}: {}", fragment.location, fragment.reason);
        }
    }

    let c = &report.counters;
    let status = match report.status {
        RunStatus::Success => style("success").green(),
        RunStatus::Partial => style("partial").yellow(),
        RunStatus::Failed => style("failed").red(),
    };
    let _ = writeln!(
        out,
        "\nStatus: {status}  {} ok, {} failed, {} skipped, {} cached  ({} ms)",
        c.succeeded, c.failed, c.skipped, c.cached, report.elapsed_ms
    );
    if c.total > 0 && c.cached > 0 {
        let _ = writeln!(
            out,
            "{}",
            style(format!(
                "  {}/{} summaries from cache ({}%)",
                c.cached,
                c.total,
                c.cached * 100 / c.total
            ))
            .dim()
        );
    }
    if report.deadline_exceeded {
        let _ = writeln!(
            out,
            "{}",
            style("  run deadline elapsed; unfinished endpoints were skipped").yellow()
        );
    }
    out
}
