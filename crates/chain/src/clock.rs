//! The offset-adjustable chain clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// The chain clock: system time plus an adjustable offset. `evm_increaseTime` and
/// `evm_setTime` move the offset; block timestamps are read from here, so adjustments
/// take effect on the next mined block.
#[derive(Debug, Default)]
pub struct Clock {
    offset_ms: AtomicI64,
}

impl Clock {
    /// Creates a clock. With `initial_time` set, the clock starts there instead of at the
    /// system time.
    pub fn new(initial_time_ms: Option<u64>) -> Self {
        let clock = Self::default();
        if let Some(time) = initial_time_ms {
            clock.set_time_ms(time);
        }
        clock
    }

    fn system_now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or_default()
    }

    /// The current chain time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        (Self::system_now_ms() + self.offset_ms.load(Ordering::Relaxed)).max(0) as u64
    }

    /// The current chain time in seconds, as used for block timestamps.
    pub fn now_secs(&self) -> u64 {
        self.now_ms() / 1_000
    }

    /// Advances the offset by `seconds`, returning the new offset in seconds.
    pub fn increase_time(&self, seconds: u64) -> i64 {
        let added = (seconds as i64).saturating_mul(1_000);
        (self.offset_ms.fetch_add(added, Ordering::Relaxed) + added) / 1_000
    }

    /// Pins the clock to the given epoch milliseconds, returning the new offset in
    /// seconds.
    pub fn set_time_ms(&self, timestamp_ms: u64) -> i64 {
        let offset = timestamp_ms as i64 - Self::system_now_ms();
        self.offset_ms.store(offset, Ordering::Relaxed);
        offset / 1_000
    }

    /// The current offset in milliseconds, captured by snapshots.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    /// Restores an offset captured by a snapshot.
    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_time_moves_clock_forward() {
        let clock = Clock::new(None);
        let before = clock.now_secs();
        clock.increase_time(3_600);
        assert!(clock.now_secs() >= before + 3_600);
        assert_eq!(clock.offset_ms(), 3_600_000);
    }

    #[test]
    fn test_set_time_pins_clock() {
        let clock = Clock::new(None);
        clock.set_time_ms(1_000_000_000_000);
        let now = clock.now_ms();
        assert!((1_000_000_000_000..1_000_000_005_000).contains(&now));
    }

    #[test]
    fn test_offset_roundtrip_restores_time() {
        let clock = Clock::new(None);
        clock.increase_time(500);
        let captured = clock.offset_ms();
        clock.increase_time(500);
        clock.set_offset_ms(captured);
        assert_eq!(clock.offset_ms(), captured);
    }

    #[test]
    fn test_initial_time_option() {
        let clock = Clock::new(Some(5_000));
        assert!(clock.now_ms() < 100_000);
    }
}
