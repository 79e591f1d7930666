//! # restsum cache
//!
//! Content-addressed store mapping an endpoint fingerprint to its summary
//! across runs.
//!
//! ```text
//! fingerprint = blake3(endpoint id | version tag)
//!
//! <cache_dir>/
//!   .lock                     exclusive per run (fs2); held lock => cache disabled
//!   3f/3fa9...e1.json         CacheEntry, written tmp + rename, replaced only once stale
//! ```
//!
//! Failures never abort a run: the cache degrades to "always miss".

mod entry;
mod error;
mod store;

pub use entry::{fingerprint, unix_ms_now, CacheEntry};
pub use error::{CacheError, Result};
pub use store::{CacheBackend, CacheConfig, CacheStats, SummaryCache};
