use core::time::Duration;

use crate::Clock;

/// Outcome of a bounded poll. Both arms carry the last value read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Poll<T> {
    Ready(T),
    TimedOut(T),
}

impl<T> Poll<T> {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Poll::Ready(_))
    }

    pub fn into_value(self) -> T {
        match self {
            Poll::Ready(v) | Poll::TimedOut(v) => v,
        }
    }
}

/// Call `read` until `done` accepts its value or `timeout` elapses on `clock`.
///
/// The condition is checked at least once, and once more after the deadline
/// has passed. A failing `read` ends the poll with its error.
pub fn poll_timeout<T, E>(
    clock: &dyn Clock,
    timeout: Duration,
    mut read: impl FnMut() -> Result<T, E>,
    mut done: impl FnMut(&T) -> bool,
) -> Result<Poll<T>, E> {
    let deadline = clock.now().saturating_add(timeout);
    loop {
        let expired = clock.now() >= deadline;
        let value = read()?;
        if done(&value) {
            return Ok(Poll::Ready(value));
        }
        if expired {
            return Ok(Poll::TimedOut(value));
        }
        clock.relax();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FakeClock;

    #[test]
    fn test_ready_on_first_read() {
        let clock = FakeClock::new();
        let result: Result<_, ()> =
            poll_timeout(&clock, Duration::from_millis(500), || Ok(0x10u32), |v| v & 0x10 != 0);

        assert_eq!(result, Ok(Poll::Ready(0x10)));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_becomes_ready_after_some_reads() {
        let clock = FakeClock::new();
        let mut reads = 0;
        let result: Result<_, ()> = poll_timeout(
            &clock,
            Duration::from_millis(500),
            || {
                reads += 1;
                Ok(reads)
            },
            |&v| v == 3,
        );

        assert_eq!(result, Ok(Poll::Ready(3)));
        assert_eq!(clock.elapsed(), Duration::from_millis(2));
    }

    #[test]
    fn test_times_out_with_last_value() {
        let clock = FakeClock::new();
        let result: Result<_, ()> =
            poll_timeout(&clock, Duration::from_millis(500), || Ok(0x80u32), |_| false);

        assert_eq!(result, Ok(Poll::TimedOut(0x80)));
        assert!(clock.elapsed() >= Duration::from_millis(500));
        assert!(!result.unwrap().is_ready());
    }

    #[test]
    fn test_read_error_aborts() {
        let clock = FakeClock::new();
        let result: Result<Poll<u32>, &str> =
            poll_timeout(&clock, Duration::from_millis(500), || Err("bus"), |_| true);

        assert_eq!(result, Err("bus"));
    }
}
