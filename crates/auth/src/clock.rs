//! Timestamp sources for signature bases.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the millisecond timestamps that go into signatures.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock, optionally corrected by the offset between local and server time.
#[derive(Debug, Default)]
pub struct SystemClock {
    /// Offset between local clock and exchange server (local - server).
    offset_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset_ms(offset_ms: i64) -> Self {
        Self {
            offset_ms: AtomicI64::new(offset_ms),
        }
    }

    /// Update the offset after a server time sync.
    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
        tracing::debug!(offset_ms, "Clock offset updated");
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        local_time_ms() - self.offset_ms()
    }
}

/// Clock that always reports the same instant. Makes signatures reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Milliseconds since the Unix epoch according to the local clock.
pub fn local_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(1_499_827_319_559).now_ms(), 1_499_827_319_559);
    }

    #[test]
    fn test_system_clock_applies_offset() {
        let clock = SystemClock::with_offset_ms(60_000);
        let local = local_time_ms();
        let adjusted = clock.now_ms();

        // Adjusted time trails local time by roughly the offset
        assert!(local - adjusted >= 59_000 && local - adjusted <= 61_000);

        clock.set_offset_ms(0);
        assert_eq!(clock.offset_ms(), 0);
    }
}
