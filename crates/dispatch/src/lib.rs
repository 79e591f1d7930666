//! # restsum dispatch
//!
//! Turns canonical endpoints into one-line summaries through an external
//! AI backend, with bounded concurrency, retries and a run deadline.
//!
//! ```text
//! endpoints (discovery order)
//!    │
//!    ├─ skipped by policy ───────────────────────────► Skipped
//!    ├─ cache hit (fingerprint = id + version tag) ──► Ok, from_cache
//!    └─ miss ─► JoinSet task
//!                 pacer ─► semaphore (N) ─► backend.summarize (timeout)
//!                 RequestState: Pending → Retrying* → Succeeded | Failed
//!                 Succeeded ─► cache put
//!
//! run deadline ─► abort_all + drain ─► unfinished = Skipped
//! results reassembled in discovery order
//! ```
//!
//! Backends: `gemini` (generateContent), `openai` (chat completions) and
//! `stub` (offline, deterministic).

mod backend;
mod dispatcher;
mod error;
mod gemini;
mod limits;
mod openai;
pub mod prompt;
mod retry;
mod stub;

pub use backend::{build_backend, BackendConfig, BackendKind, SummaryBackend, SummaryRequest};
pub use dispatcher::{
    DispatchConfig, DispatchOutcome, Dispatcher, ProgressFn, DEADLINE_MESSAGE,
    UNKNOWN_METHOD_MESSAGE,
};
pub use error::{BackendError, Result};
pub use gemini::{GeminiBackend, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use limits::{
    clamp_concurrency, parse_concurrency, ConcurrencyGate, ConcurrencySnapshot, Pacer,
    DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
};
pub use openai::{OpenAiBackend, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
pub use prompt::{DEFAULT_MAX_SUMMARY_CHARS, PROMPT_VERSION};
pub use retry::{RequestState, RetryPolicy};
pub use stub::{stub_summary, StubBackend, STUB_MODEL};
