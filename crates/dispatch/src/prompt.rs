//! Prompt construction and answer post-processing.

use once_cell::sync::Lazy;
use regex::Regex;
use restsum_protocol::Endpoint;
use std::fmt::Write as _;
use unicode_segmentation::UnicodeSegmentation;

/// Bumped whenever the prompt wording changes; part of every version tag.
pub const PROMPT_VERSION: u32 = 1;

pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 50;

const RELEVANT_KEYWORDS: &[&str] = &[
    "def ", "fn ", "function", "return", "create", "update", "delete", "get", "post", "find",
    "save",
];

const MAX_RELEVANT_LINES: usize = 3;

static LIST_MARKER: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[\d+\]|\d+[.)]|[-*•])\s*")
        .map_err(|err| log::error!("Invalid list marker regex: {err}"))
        .ok()
});

/// Build the single-endpoint prompt sent to a backend.
pub fn build_prompt(endpoint: &Endpoint, max_chars: usize) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Analyze this REST API endpoint and provide a one-line summary (max {max_chars} chars)."
    );
    prompt.push_str("Answer with the summary only.\n\n");
    let _ = writeln!(prompt, "{} {}", endpoint.method, endpoint.display_path);

    if !endpoint.handlers.is_empty() {
        let _ = writeln!(prompt, "Handler: {}", endpoint.handlers.join(", "));
    }
    if !endpoint.parameters.is_empty() {
        let params: Vec<String> = endpoint
            .parameters
            .iter()
            .map(|p| match &p.type_hint {
                Some(hint) => format!("{} ({}, {hint})", p.name, p.location.as_str()),
                None => format!("{} ({})", p.name, p.location.as_str()),
            })
            .collect();
        let _ = writeln!(prompt, "Parameters: {}", params.join(", "));
    }
    if let Some(context) = endpoint.context.as_deref() {
        let code = relevant_code(context);
        if !code.is_empty() {
            let _ = writeln!(prompt, "Code: {code}");
        }
    }
    prompt.push_str("\nSummary:");
    prompt
}

/// Keep at most a few lines that say what the handler does.
pub fn relevant_code(context: &str) -> String {
    let lines: Vec<&str> = context
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with('#'))
        .collect();

    let mut relevant: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            RELEVANT_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .take(MAX_RELEVANT_LINES)
        .collect();

    if relevant.is_empty() {
        relevant.extend(lines.first().copied());
    }
    relevant.join("; ")
}

/// Reduce a raw backend answer to one display line.
///
/// Returns `None` when nothing usable is left, which callers treat as an
/// empty answer.
pub fn postprocess(raw: &str, max_chars: usize) -> Option<String> {
    let line = raw
        .lines()
        .map(str::trim)
        .map(|line| line.trim_start_matches("Summary:").trim())
        .map(strip_list_marker)
        .map(|line| line.trim_matches(|c| c == '"' || c == '`' || c == '*').trim())
        .find(|line| !line.is_empty())?;

    Some(truncate_graphemes(line, max_chars))
}

fn strip_list_marker(line: &str) -> &str {
    match LIST_MARKER.as_ref().and_then(|re| re.find(line)) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Truncate to `max_chars` graphemes, marking the cut with `...`.
pub fn truncate_graphemes(text: &str, max_chars: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = graphemes[..keep].concat();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}
