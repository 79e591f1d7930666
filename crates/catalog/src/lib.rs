//! # restsum catalog
//!
//! Turns the raw candidate stream into the canonical endpoint set.
//!
//! ```text
//! EndpointCandidate*
//!     │
//!     ├──> normalize_path   //users/{userId}/  ->  /users/{0}
//!     ├──> group by (method, normalized path), first-seen order
//!     ├──> merge            params (path ones by position), handlers,
//!     │                     sources, frameworks, most specific type hints
//!     └──> UnknownMethodPolicy (warn | skip | drop)
//!             └─> Catalog { endpoints, skipped, dropped }
//! ```

mod normalizer;
mod path;
mod policy;

pub use normalizer::{endpoint_id, Catalog, Normalizer, NormalizerConfig, UNKNOWN_METHOD_WARNING};
pub use path::{normalize_path, NormalizedPath};
pub use policy::UnknownMethodPolicy;
