mod api_document;
mod patterns;
mod route_table;
mod source;

pub use api_document::ApiDocumentExtractor;
pub use route_table::RouteTableExtractor;
pub use source::SourceCodeExtractor;

use crate::config::ExtractOptions;
use crate::error::{ExtractError, Result};
use crate::reader::{RawFragment, SourceReader};
use restsum_protocol::{EndpointCandidate, InputKind, MalformedFragment};

/// Turns one fragment into zero or more raw endpoint candidates
pub trait Extract {
    /// Fails with `MalformedInput` only when the fragment cannot be parsed at all.
    fn extract(&self, fragment: &RawFragment) -> Result<Vec<EndpointCandidate>>;
}

/// Extractor selected by input kind
#[derive(Debug, Clone)]
pub enum Extractor {
    SourceCode(SourceCodeExtractor),
    ApiDocument(ApiDocumentExtractor),
    RouteTable(RouteTableExtractor),
}

impl Extractor {
    pub fn for_kind(kind: InputKind, options: ExtractOptions) -> Self {
        match kind {
            InputKind::SourceTree => Extractor::SourceCode(SourceCodeExtractor::new(options)),
            InputKind::ApiDocument => Extractor::ApiDocument(ApiDocumentExtractor),
            InputKind::RouteTable => Extractor::RouteTable(RouteTableExtractor),
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Extractor::SourceCode(_) => InputKind::SourceTree,
            Extractor::ApiDocument(_) => InputKind::ApiDocument,
            Extractor::RouteTable(_) => InputKind::RouteTable,
        }
    }
}

impl Extract for Extractor {
    fn extract(&self, fragment: &RawFragment) -> Result<Vec<EndpointCandidate>> {
        match self {
            Extractor::SourceCode(inner) => inner.extract(fragment),
            Extractor::ApiDocument(inner) => inner.extract(fragment),
            Extractor::RouteTable(inner) => inner.extract(fragment),
        }
    }
}

/// Everything one extraction pass produced
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Candidates in fragment order, then line order
    pub candidates: Vec<EndpointCandidate>,
    pub malformed: Vec<MalformedFragment>,
    /// Fragments successfully read
    pub fragments: usize,
}

/// Run the extractor matching the reader's kind over every fragment.
///
/// Unreadable or unparseable fragments are recorded in `malformed` and skipped.
pub fn scan(reader: &SourceReader, options: &ExtractOptions) -> ScanOutcome {
    let extractor = Extractor::for_kind(reader.kind(), options.clone());
    let mut outcome = ScanOutcome::default();

    for item in reader.fragments() {
        let fragment = match item {
            Ok(fragment) => fragment,
            Err(err) => {
                log::warn!("Skipping unreadable fragment: {err}");
                outcome.malformed.push(malformed_entry(err, None));
                continue;
            }
        };
        outcome.fragments += 1;

        match extractor.extract(&fragment) {
            Ok(candidates) => outcome.candidates.extend(candidates),
            Err(err) => {
                log::warn!("Skipping malformed fragment: {err}");
                outcome
                    .malformed
                    .push(malformed_entry(err, Some(&fragment.location.file)));
            }
        }
    }

    log::info!(
        "Extracted {} candidates from {} fragments ({} malformed)",
        outcome.candidates.len(),
        outcome.fragments,
        outcome.malformed.len()
    );
    outcome
}

fn malformed_entry(err: ExtractError, fallback: Option<&str>) -> MalformedFragment {
    match err {
        ExtractError::MalformedInput { location, reason } => MalformedFragment { location, reason },
        ExtractError::Io { path, source } => MalformedFragment {
            location: path.display().to_string(),
            reason: source.to_string(),
        },
        other => MalformedFragment {
            location: fallback.unwrap_or_default().to_string(),
            reason: other.to_string(),
        },
    }
}
