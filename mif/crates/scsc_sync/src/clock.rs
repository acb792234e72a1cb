use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use jiff::Timestamp;

/// A point on a [`Clock`]'s monotonic timeline, in nanoseconds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Instant(u64);

impl Instant {
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// `self + d`, saturating at the end of the timeline.
    #[must_use]
    pub fn saturating_add(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// Source of time for bounded waits.
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Busy-wait for at least `d` (udelay/mdelay).
    fn delay(&self, d: Duration);

    /// Called once per iteration of a bounded wait loop.
    fn relax(&self) {
        core::hint::spin_loop();
    }

    /// Wall-clock time, used to stamp diagnostic records.
    fn wall(&self) -> Timestamp {
        Timestamp::UNIX_EPOCH
    }
}

/// A clock that only moves when told to.
///
/// [`Clock::relax`] advances it by one tick, so every bounded loop written
/// against [`Clock`] terminates after `timeout / tick` iterations without
/// sleeping.
pub struct FakeClock {
    now: AtomicU64,
    tick: AtomicU64,
}

impl FakeClock {
    /// Clock at zero with a 1 ms tick.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
            tick: AtomicU64::new(1_000_000),
        }
    }

    #[must_use]
    pub fn with_tick(tick: Duration) -> Self {
        let clock = Self::new();
        clock.set_tick(tick);
        clock
    }

    pub fn set_tick(&self, tick: Duration) {
        let nanos = u64::try_from(tick.as_nanos()).unwrap_or(u64::MAX);
        self.tick.store(nanos, Ordering::Relaxed);
    }

    pub fn advance(&self, d: Duration) {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        self.now.fetch_add(nanos, Ordering::AcqRel);
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.now.load(Ordering::Acquire))
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant(self.now.load(Ordering::Acquire))
    }

    fn delay(&self, d: Duration) {
        self.advance(d);
    }

    fn relax(&self) {
        let tick = self.tick.load(Ordering::Relaxed);
        self.now.fetch_add(tick, Ordering::AcqRel);
    }

    fn wall(&self) -> Timestamp {
        let nanos = i128::from(self.now.load(Ordering::Acquire));
        Timestamp::from_nanosecond(nanos).unwrap_or(Timestamp::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_arithmetic() {
        let a = Instant::from_nanos(1_000);
        let b = a.saturating_add(Duration::from_micros(1));

        assert_eq!(b.as_nanos(), 2_000);
        assert_eq!(b.saturating_duration_since(a), Duration::from_micros(1));
        assert_eq!(a.saturating_duration_since(b), Duration::ZERO);
        assert_eq!(
            Instant::from_nanos(u64::MAX).saturating_add(Duration::from_secs(1)),
            Instant::from_nanos(u64::MAX)
        );
    }

    #[test]
    fn test_fake_clock_moves_only_on_demand() {
        let clock = FakeClock::with_tick(Duration::from_micros(10));
        assert_eq!(clock.now(), Instant::from_nanos(0));

        clock.relax();
        assert_eq!(clock.elapsed(), Duration::from_micros(10));

        clock.delay(Duration::from_millis(1));
        assert_eq!(clock.elapsed(), Duration::from_micros(1_010));
    }

    #[test]
    fn test_fake_clock_wall_time_follows_timeline() {
        let clock = FakeClock::new();
        clock.advance(Duration::from_secs(3));

        assert_eq!(clock.wall().as_second(), 3);
    }
}
