//! # restsum protocol
//!
//! Data model shared by every stage of the endpoint pipeline:
//!
//! ```text
//! RawFragment ──> EndpointCandidate ──> Endpoint ──> SummaryResult ──> Report
//!  (extractor)       (extractor)        (catalog)      (dispatch)      (pipeline)
//! ```
//!
//! Everything that ends up in a [`Report`] is `Serialize + JsonSchema` so the
//! JSON output is a stable, documented structure.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

mod report;

pub use report::{
    report_json_schema, MalformedFragment, Report, ReportEntry, ReportInput, RunCounters,
    RunStatus, REPORT_SCHEMA_VERSION,
};

/// HTTP verb of an endpoint. `Unknown` marks partial matches where only the path was found.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Unknown,
}

impl HttpMethod {
    pub const KNOWN: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    /// Parse a method token case-insensitively; anything unrecognised is `Unknown`.
    pub fn from_token(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" | "DEL" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "TRACE" => HttpMethod::Trace,
            _ => HttpMethod::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(self) -> bool {
        self != HttpMethod::Unknown
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter travels in the request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
    Header,
    Cookie,
}

impl ParamLocation {
    /// Map an OpenAPI/Swagger `in` value. Swagger 2 `formData` travels in the body.
    pub fn from_token(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "body" | "formdata" => Some(ParamLocation::Body),
            "header" => Some(ParamLocation::Header),
            "cookie" => Some(ParamLocation::Cookie),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParamLocation) -> Self {
        Self {
            name: name.into(),
            location,
            type_hint: None,
        }
    }

    #[must_use]
    pub fn with_type_hint(mut self, hint: Option<String>) -> Self {
        self.type_hint = hint.filter(|h| !h.trim().is_empty());
        self
    }
}

/// File (relative to the scanned root) plus an optional 1-indexed line.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct SourceLocation {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file),
            None => f.write_str(&self.file),
        }
    }
}

/// Raw endpoint as produced by an extractor, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCandidate {
    pub method: HttpMethod,
    /// Path with `{name}` placeholders.
    pub path_template: String,
    pub handler_name: Option<String>,
    pub parameters: Vec<Parameter>,
    pub source: SourceLocation,
    /// Framework or document flavour that matched ("express", "openapi", ...).
    pub framework: Option<String>,
    /// Surrounding code or documentation used as prompt context.
    pub context: Option<String>,
}

impl EndpointCandidate {
    pub fn new(method: HttpMethod, path_template: impl Into<String>, source: SourceLocation) -> Self {
        Self {
            method,
            path_template: path_template.into(),
            handler_name: None,
            parameters: Vec::new(),
            source,
            framework: None,
            context: None,
        }
    }

    #[must_use]
    pub fn with_handler(mut self, handler: Option<String>) -> Self {
        self.handler_name = handler.filter(|h| !h.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }
}

/// Canonical endpoint: one per (method, normalized path) within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Endpoint {
    /// Stable fingerprint of (method, normalized path template).
    pub id: String,
    pub method: HttpMethod,
    /// Normalized template with positional placeholders (`/users/{0}`).
    pub path_template: String,
    /// Lexicographically smallest original template among merged candidates.
    pub display_path: String,
    pub parameters: Vec<Parameter>,
    pub occurrences: usize,
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceLocation>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Ok,
    Failed,
    Skipped,
}

/// Error taxonomy surfaced per endpoint (and, for the fatal kinds, per run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    UnsupportedInputKind,
    MalformedInput,
    TransientBackend,
    PermanentBackend,
    CacheUnavailable,
    /// The run deadline elapsed before the request finished.
    Deadline,
    /// Skipped by the unknown-method policy.
    UnknownMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResultError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of summarizing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryResult {
    pub endpoint_id: String,
    pub status: SummaryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    pub from_cache: bool,
    /// Backend calls made for this endpoint in this run.
    #[serde(default)]
    pub attempts: u32,
}

impl SummaryResult {
    pub fn cached(endpoint_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: SummaryStatus::Ok,
            summary: Some(summary.into()),
            error: None,
            from_cache: true,
            attempts: 0,
        }
    }

    pub fn generated(
        endpoint_id: impl Into<String>,
        summary: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: SummaryStatus::Ok,
            summary: Some(summary.into()),
            error: None,
            from_cache: false,
            attempts,
        }
    }

    pub fn failed(
        endpoint_id: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: SummaryStatus::Failed,
            summary: None,
            error: Some(ResultError {
                kind,
                message: message.into(),
            }),
            from_cache: false,
            attempts,
        }
    }

    pub fn skipped(
        endpoint_id: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            status: SummaryStatus::Skipped,
            summary: None,
            error: Some(ResultError {
                kind,
                message: message.into(),
            }),
            from_cache: false,
            attempts,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SummaryStatus::Ok
    }
}

/// Declared shape of the input root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    SourceTree,
    ApiDocument,
    RouteTable,
}

impl InputKind {
    pub const ALL: [InputKind; 3] = [
        InputKind::SourceTree,
        InputKind::ApiDocument,
        InputKind::RouteTable,
    ];

    /// Parse the selector used on the command line and in config files.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "source-tree" | "source" | "src" => Some(InputKind::SourceTree),
            "api-document" | "openapi" | "swagger" => Some(InputKind::ApiDocument),
            "route-table" | "routes" => Some(InputKind::RouteTable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::SourceTree => "source-tree",
            InputKind::ApiDocument => "api-document",
            InputKind::RouteTable => "route-table",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
