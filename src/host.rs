//! Host services backed by the standard library.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use colored::Colorize;
use jiff::Timestamp;
use log::{debug, error};
use scsc_mif::panicmon::SubsystemManager;
use scsc_mif::work::{CfgWork, WorkScheduler};
use scsc_sync::{Clock, Instant};

/// Monotonic time from [`std::time::Instant`], measured from creation.
pub struct StdClock {
    start: std::time::Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::from_nanos(u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX))
    }

    fn delay(&self, d: Duration) {
        thread::sleep(d);
    }

    fn relax(&self) {
        thread::sleep(Duration::from_micros(100));
    }

    fn wall(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Runs each work item on its own thread. Cancelling bumps a generation so
/// threads that have not started their item yet drop it.
#[derive(Default)]
pub struct ThreadScheduler {
    generation: Arc<AtomicU64>,
}

impl WorkScheduler for ThreadScheduler {
    fn schedule(&self, work: CfgWork) {
        let generation = self.generation.clone();
        let scheduled = generation.load(Ordering::Acquire);
        let spawned = thread::Builder::new()
            .name("cfg_req".into())
            .spawn(move || {
                if generation.load(Ordering::Acquire) == scheduled {
                    work.run();
                } else {
                    debug!("cfg work cancelled before it ran");
                }
            });
        if let Err(err) = spawned {
            error!("failed to spawn cfg worker: {err}");
        }
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Prints escalations instead of recovering the subsystem.
pub struct ConsoleManager;

impl SubsystemManager for ConsoleManager {
    fn fail(&self, code: u16, reason: &str) {
        println!(
            "{} code {:#06x}: {}",
            "subsystem failure".red().bold(),
            code,
            reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_clock_is_monotonic() {
        let clock = StdClock::new();
        let before = clock.now();
        clock.delay(Duration::from_millis(1));
        assert!(clock.now().saturating_duration_since(before) >= Duration::from_millis(1));
    }
}
