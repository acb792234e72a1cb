//! Panic monitor
//!
//! Watches a transport's reset-request line and escalates fatal conditions to
//! the subsystem manager. A condition is escalated once; repeats are logged
//! and dropped until [`PanicMonitor::rearm`], which the manager calls once it
//! has recovered the subsystem.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use jiff::Timestamp;
use log::{error, info, warn};
use scsc_sync::Clock;
use spin::Mutex;

use crate::{MifError, MifTransport};

/// Panic raised by the firmware.
pub const PANIC_CODE_FW: u16 = 0;
/// Panic raised by the host.
pub const PANIC_CODE_HOST: u16 = 1;

const PANIC_CODE_SHIFT: u32 = 15;

/// Receives fatal subsystem conditions.
pub trait SubsystemManager: Send + Sync {
    fn fail(&self, code: u16, reason: &str);
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FailureReport {
    pub code: u16,
    pub reason: String,
    pub at: Timestamp,
}

pub struct PanicMonitor {
    manager: Arc<dyn SubsystemManager>,
    clock: Arc<dyn Clock>,
    fw_escalated: AtomicBool,
    host_escalated: AtomicBool,
    reports: Mutex<Vec<FailureReport>>,
}

impl PanicMonitor {
    #[must_use]
    pub fn new(manager: Arc<dyn SubsystemManager>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            manager,
            clock,
            fw_escalated: AtomicBool::new(false),
            host_escalated: AtomicBool::new(false),
            reports: Mutex::new(Vec::new()),
        })
    }

    /// Hook the reset-request line of `mif`.
    pub fn init(self: &Arc<Self>, mif: &dyn MifTransport) {
        let weak = Arc::downgrade(self);
        mif.register_reset_request_handler(Arc::new(move || {
            if let Some(monitor) = weak.upgrade() {
                monitor.on_reset_request();
            }
        }));
        info!("panic monitor attached");
    }

    pub fn deinit(&self, mif: &dyn MifTransport) {
        mif.unregister_reset_request_handler();
        info!("panic monitor detached");
    }

    /// The firmware asked to be reset. Runs in interrupt context.
    pub fn on_reset_request(&self) {
        error!("WLBT requested a reset");
        self.escalate(&self.fw_escalated, PANIC_CODE_FW, "reset request from WLBT".to_string());
    }

    /// The host failed to bring the subsystem up.
    pub fn report_boot_failure(&self, err: &MifError) {
        error!("WLBT boot failed: {err}");
        self.escalate(&self.host_escalated, PANIC_CODE_HOST, format!("boot failed: {err}"));
    }

    pub fn rearm(&self) {
        self.fw_escalated.store(false, Ordering::Release);
        self.host_escalated.store(false, Ordering::Release);
        info!("panic monitor re-armed");
    }

    #[must_use]
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().clone()
    }

    fn escalate(&self, latch: &AtomicBool, panic_code: u16, reason: String) {
        if latch.swap(true, Ordering::AcqRel) {
            warn!("{reason}: already escalated");
            return;
        }

        let code = panic_code << PANIC_CODE_SHIFT;
        self.reports.lock().push(FailureReport {
            code,
            reason: reason.clone(),
            at: self.clock.wall(),
        });
        self.manager.fail(code, &reason);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use scsc_sync::FakeClock;

    use super::*;

    #[derive(Default)]
    struct RecordingManager {
        failures: Mutex<Vec<(u16, String)>>,
    }

    impl SubsystemManager for RecordingManager {
        fn fail(&self, code: u16, reason: &str) {
            self.failures.lock().push((code, reason.to_string()));
        }
    }

    #[test]
    fn test_each_condition_escalates_once() {
        let manager = Arc::new(RecordingManager::default());
        let monitor = PanicMonitor::new(manager.clone(), Arc::new(FakeClock::new()));

        monitor.on_reset_request();
        monitor.on_reset_request();
        monitor.report_boot_failure(&MifError::Timeout { what: "CFG_REQ" });
        monitor.report_boot_failure(&MifError::ProtocolViolation);

        assert_eq!(
            *manager.failures.lock(),
            vec![
                (0, "reset request from WLBT".to_string()),
                (0x8000, "boot failed: timed out waiting for CFG_REQ".to_string()),
            ]
        );
        assert_eq!(monitor.reports().len(), 2);
    }

    #[test]
    fn test_rearm_allows_next_escalation() {
        let manager = Arc::new(RecordingManager::default());
        let monitor = PanicMonitor::new(manager.clone(), Arc::new(FakeClock::new()));

        monitor.on_reset_request();
        monitor.rearm();
        monitor.on_reset_request();

        assert_eq!(manager.failures.lock().len(), 2);
        assert_eq!(monitor.reports()[1].at, Timestamp::UNIX_EPOCH);
    }
}
