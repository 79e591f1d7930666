use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 32;

pub fn clamp_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_CONCURRENCY)
}

/// Parse a user-supplied limit; blank or invalid input falls back to the default.
pub fn parse_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_CONCURRENCY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencySnapshot {
    pub limit: usize,
    pub in_flight: usize,
    pub waiters: usize,
    /// Highest `in_flight` seen so far.
    pub peak: usize,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    waiters: AtomicUsize,
    peak: AtomicUsize,
}

/// Run-wide admission semaphore for backend requests.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
    counters: Arc<Counters>,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        let limit = clamp_concurrency(limit);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn snapshot(&self) -> ConcurrencySnapshot {
        ConcurrencySnapshot {
            limit: self.limit,
            in_flight: self.counters.in_flight.load(Ordering::Relaxed),
            waiters: self.counters.waiters.load(Ordering::Relaxed),
            peak: self.counters.peak.load(Ordering::Relaxed),
        }
    }

    /// Wait for a slot. `None` only once the gate has been closed.
    pub async fn acquire(&self) -> Option<RequestPermit> {
        let waiter = WaiterGuard::new(&self.counters);
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        drop(waiter);
        let now = self.counters.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters.peak.fetch_max(now, Ordering::Relaxed);
        Some(RequestPermit {
            _permit: permit,
            counters: self.counters.clone(),
        })
    }

    pub fn close(&self) {
        self.semaphore.close();
    }
}

pub struct RequestPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for RequestPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

struct WaiterGuard<'a>(&'a Counters);

impl<'a> WaiterGuard<'a> {
    fn new(counters: &'a Counters) -> Self {
        counters.waiters.fetch_add(1, Ordering::Relaxed);
        Self(counters)
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.waiters.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Spaces out request starts across the whole run.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Reserve the next start slot and sleep until it arrives.
    pub async fn wait(&self) {
        if !self.is_enabled() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_concurrency_defaults_and_clamps() {
        assert_eq!(parse_concurrency(None, DEFAULT_CONCURRENCY), 4);
        assert_eq!(parse_concurrency(Some("   "), DEFAULT_CONCURRENCY), 4);
        assert_eq!(parse_concurrency(Some("2"), DEFAULT_CONCURRENCY), 2);
        assert_eq!(parse_concurrency(Some("0"), DEFAULT_CONCURRENCY), 1);
        assert_eq!(parse_concurrency(Some("999"), DEFAULT_CONCURRENCY), MAX_CONCURRENCY);
        assert_eq!(parse_concurrency(Some("abc"), DEFAULT_CONCURRENCY), 4);
        assert_eq!(parse_concurrency(Some(" 5 "), DEFAULT_CONCURRENCY), 5);
    }

    #[tokio::test]
    async fn permits_track_in_flight_and_peak() {
        let gate = ConcurrencyGate::new(2);
        let a = gate.acquire().await.expect("permit");
        let b = gate.acquire().await.expect("permit");
        assert_eq!(gate.snapshot().in_flight, 2);
        drop(a);
        assert_eq!(gate.snapshot().in_flight, 1);
        drop(b);
        let snap = gate.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.peak, 2);
        assert_eq!(snap.limit, 2);
    }

    #[tokio::test]
    async fn closed_gate_refuses_permits() {
        let gate = ConcurrencyGate::new(1);
        gate.close();
        assert!(gate.acquire().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_out_starts() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
