//! Injectable monotonic clock (SPEC_FULL.md §9 "Time source").
//!
//! Staleness logic (enhanced-summary validity, §4.10) needs to be testable
//! without sleeping real wall-clock time, so every clock read in the engine
//! goes through this trait rather than `Instant::now()` directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonically non-decreasing source of time, in seconds since an
/// arbitrary epoch fixed at construction.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_s(&self) -> f64;
}

/// Production clock backed by `std::time::Instant`.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Test-hook clock: time only advances when explicitly told to.
/// Gated behind `test-hooks` at the call sites that expose it publicly, but
/// kept unconditionally compiled so `Session` can hold a `dyn Clock` without
/// a feature-specific type.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    micros: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, delta: Duration) {
        self.micros
            .fetch_add(delta.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now_s(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_only_moves_on_advance() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now_s(), 0.0);
        clock.advance(Duration::from_millis(500));
        assert!((clock.now_s() - 0.5).abs() < 1e-9);
        clock.advance(Duration::from_secs(2));
        assert!((clock.now_s() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_s();
        let b = clock.now_s();
        assert!(b >= a);
    }
}
