//! Monotonic tick source.
//!
//! A direct `clock_gettime(CLOCK_MONOTONIC)` call bypasses
//! `std::time::Instant`'s extra bookkeeping; reading it never suspends the
//! calling thread.
//!
//! Latency bookkeeping throughout this crate works in *ticks*, not
//! `Duration`, so the hot path never constructs a `Duration` per operation.
//! A tick is one microsecond; [`TICKS_PER_SECOND`] makes that explicit
//! instead of leaving it as an implicit constant scattered through the code.

/// Number of ticks in one second. A tick is one microsecond.
pub const TICKS_PER_SECOND: u64 = 1_000_000;

/// A monotonic instant, expressed in ticks since an arbitrary epoch.
///
/// Only differences between two `Tick` values are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(u64);

impl Tick {
    /// Read the current tick. Never suspends: a single `clock_gettime` call.
    #[inline(always)]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        let micros = (ts.tv_sec as u64) * TICKS_PER_SECOND + (ts.tv_nsec as u64) / 1_000;
        Self(micros)
    }

    /// Ticks elapsed between `earlier` and `self`. Saturates at zero if
    /// `earlier` is somehow later (clock is monotonic, but callers may race
    /// timestamps taken on different threads).
    #[inline(always)]
    pub fn since(&self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Raw tick value, for storing in a `Slot` header.
    #[inline(always)]
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Construct a `Tick` from a raw value, e.g. one read back out of a slot.
    #[inline(always)]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Seconds elapsed since `start`, rounded down. Used for phase gating.
    #[inline(always)]
    pub fn seconds_since(&self, start: Tick) -> u64 {
        self.since(start) / TICKS_PER_SECOND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn monotonic_ticks_advance() {
        let a = Tick::now();
        thread::sleep(Duration::from_millis(5));
        let b = Tick::now();
        assert!(b >= a);
        assert!(b.since(a) >= 4_000);
    }

    #[test]
    fn since_saturates_instead_of_underflowing() {
        let a = Tick::from_raw(100);
        let b = Tick::from_raw(50);
        assert_eq!(b.since(a), 0);
    }

    #[test]
    fn seconds_since_rounds_down() {
        let start = Tick::from_raw(0);
        let later = Tick::from_raw(TICKS_PER_SECOND * 2 + 500_000);
        assert_eq!(later.seconds_since(start), 2);
    }
}
