use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use crate::Clock;

/// Counting completion.
///
/// `complete` may run on interrupt context and never blocks. Each
/// `complete` satisfies exactly one wait, including a wait that starts after
/// the signal was raised.
#[derive(Debug)]
pub struct Completion {
    done: AtomicU32,
}

impl Completion {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            done: AtomicU32::new(0),
        }
    }

    /// Signal one waiter.
    pub fn complete(&self) {
        let _ = self
            .done
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1));
    }

    /// Drop any signal that has not been consumed yet.
    pub fn reinit(&self) {
        self.done.store(0, Ordering::Release);
    }

    /// `true` if a signal is pending.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire) > 0
    }

    /// Consume a pending signal without waiting.
    pub fn try_wait(&self) -> bool {
        self.done
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Wait for a signal for at most `timeout` on `clock`.
    ///
    /// Returns `false` on timeout.
    pub fn wait_timeout(&self, clock: &dyn Clock, timeout: Duration) -> bool {
        let deadline = clock.now().saturating_add(timeout);
        loop {
            if self.try_wait() {
                return true;
            }
            if clock.now() >= deadline {
                return false;
            }
            clock.relax();
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FakeClock;

    #[test]
    fn test_signal_before_wait_is_observed() {
        let clock = FakeClock::new();
        let completion = Completion::new();

        completion.complete();
        assert!(completion.wait_timeout(&clock, Duration::from_secs(1)));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_each_signal_satisfies_one_wait() {
        let completion = Completion::new();
        completion.complete();
        completion.complete();

        assert!(completion.try_wait());
        assert!(completion.try_wait());
        assert!(!completion.try_wait());
    }

    #[test]
    fn test_timeout_respects_deadline() {
        let clock = FakeClock::with_tick(Duration::from_millis(1));
        let completion = Completion::new();

        assert!(!completion.wait_timeout(&clock, Duration::from_secs(1)));
        let elapsed = clock.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed <= Duration::from_millis(1_001));
    }

    #[test]
    fn test_reinit_discards_stale_signal() {
        let clock = FakeClock::new();
        let completion = Completion::new();
        completion.complete();
        completion.reinit();

        assert!(!completion.is_done());
        assert!(!completion.wait_timeout(&clock, Duration::from_millis(5)));
    }
}
