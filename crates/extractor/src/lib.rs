//! # restsum extractor
//!
//! Reads raw artifacts from a root location and turns them into raw endpoint
//! candidates.
//!
//! ```text
//! root + InputKind
//!     │
//!     ├──> SourceReader (ignore-aware walk, size/noise filters, globs)
//!     │        └─> RawFragment* (sorted, read lazily)
//!     │
//!     └──> Extractor (by kind)
//!          ├─> SourceCode   line patterns per framework, handler lookahead,
//!          │                 comment-free context window
//!          ├─> ApiDocument  OpenAPI 3 / Swagger 2, JSON or YAML
//!          └─> RouteTable   `METHOD PATH [handler]` lines
//!                 └─> EndpointCandidate*
//! ```
//!
//! Fragments that cannot be read or parsed are collected by [`scan`] as
//! malformed entries; only an unreadable root or an unknown input kind is fatal.
//!
//! ## Example
//!
//! ```no_run
//! use restsum_extractor::{scan, ExtractOptions, ScanOptions, SourceReader};
//!
//! let reader = SourceReader::open("./my-service", "source-tree", ScanOptions::default())?;
//! let outcome = scan(&reader, &ExtractOptions::default());
//! for candidate in &outcome.candidates {
//!     println!("{} {}", candidate.method, candidate.path_template);
//! }
//! # Ok::<(), restsum_extractor::ExtractError>(())
//! ```

mod config;
mod error;
mod extract;
mod language;
mod reader;
pub mod template;

pub use config::{ExtractOptions, ScanOptions};
pub use error::{ExtractError, Result};
pub use extract::{
    scan, ApiDocumentExtractor, Extract, Extractor, RouteTableExtractor, ScanOutcome,
    SourceCodeExtractor,
};
pub use language::Language;
pub use reader::{Fragments, RawFragment, SourceReader};
