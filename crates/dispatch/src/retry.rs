//! Retry budget and the per-request state machine.
//!
//! ```text
//! Pending ──ok──────────────────────────► Succeeded
//!    │ transient (budget left)              ▲
//!    ▼                                      │ ok
//! Retrying(attempt, delay) ──transient──► Retrying(attempt + 1, delay * k)
//!    │ permanent / budget exhausted
//!    ▼
//! Failed                      deadline (any non-terminal state) ─► Skipped
//! ```

use crate::error::{BackendError, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first call.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64).max(0.0) as u64;
        let delay_ms = if self.use_jitter {
            apply_jitter(capped_ms)
        } else {
            capped_ms
        };
        Duration::from_millis(delay_ms)
    }
}

/// Random value between 50% and 100% of the delay.
fn apply_jitter(delay_ms: u64) -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let random_factor =
        (RandomState::new().hash_one(std::time::SystemTime::now()) % 50) as f64 / 100.0 + 0.5;
    (delay_ms as f64 * random_factor) as u64
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Pending,
    /// `attempt` calls have been made; wait `delay` before the next one.
    Retrying { attempt: u32, delay: Duration },
    Succeeded { text: String, attempts: u32 },
    Failed { error: BackendError, attempts: u32 },
    Skipped { attempts: u32 },
}

impl RequestState {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Retrying { attempt, .. } => *attempt,
            Self::Succeeded { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::Skipped { attempts } => *attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Skipped { .. }
        )
    }

    /// Fold the outcome of one backend call into the state.
    #[must_use]
    pub fn advance(self, outcome: Result<String>, policy: &RetryPolicy) -> Self {
        if self.is_terminal() {
            return self;
        }
        let attempts = self.attempts() + 1;
        match outcome {
            Ok(text) => Self::Succeeded { text, attempts },
            Err(error) if error.is_transient() && attempts <= policy.max_retries => {
                Self::Retrying {
                    attempt: attempts,
                    delay: policy.delay_for(attempts),
                }
            }
            Err(error) => Self::Failed { error, attempts },
        }
    }

    /// Cancellation by the run deadline.
    #[must_use]
    pub fn skip(self) -> Self {
        if self.is_terminal() {
            return self;
        }
        Self::Skipped {
            attempts: self.attempts(),
        }
    }
}
