//! Interrupt lines used by the transports
//!
//! The kernel side of interrupt handling is reduced to [`IrqController`]:
//! request a line with a handler, enable, disable, free. [`MockIrqController`]
//! lets tests and the simulator fire a line by hand.

use alloc::collections::BTreeMap;
use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::{debug, trace};
use spin::Mutex;

use crate::{MifError, MifResult};

/// Handler attached to an interrupt line.
pub type IrqHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum IrqLine {
    /// Mailbox to-host interrupt.
    Mbox,
    /// Subsystem reset request (watchdog).
    Wdog,
    /// Subsystem alive indication.
    Alive,
    /// Configuration request raised during boot.
    CfgReq,
}

impl IrqLine {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            IrqLine::Mbox => "MBOX",
            IrqLine::Wdog => "WDOG",
            IrqLine::Alive => "ALIVE",
            IrqLine::CfgReq => "CFG_REQ",
        }
    }
}

pub trait IrqController: Send + Sync {
    /// Attach `handler` to `line`. The line starts out enabled.
    fn request(&self, line: IrqLine, handler: IrqHandler) -> MifResult<()>;

    fn free(&self, line: IrqLine);

    fn enable(&self, line: IrqLine);

    /// Disable without waiting for a running handler to finish.
    fn disable(&self, line: IrqLine);

    /// Drop a latched edge on `line`. Returns whether one was pending.
    fn clear_pending(&self, line: IrqLine) -> bool;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IrqEvent {
    Request(IrqLine),
    Free(IrqLine),
    Enable(IrqLine),
    Disable(IrqLine),
    ClearPending(IrqLine),
}

type EnableHook = Arc<dyn Fn(&MockIrqController) + Send + Sync>;

#[derive(Default)]
struct MockLines {
    handlers: BTreeMap<IrqLine, IrqHandler>,
    enabled: BTreeSet<IrqLine>,
    pending: BTreeSet<IrqLine>,
    failing: BTreeSet<IrqLine>,
    hooks: BTreeMap<IrqLine, EnableHook>,
    events: Vec<IrqEvent>,
}

/// In-memory [`IrqController`].
///
/// Firing a disabled line latches it as pending; enabling a pending line
/// delivers it, as an edge-triggered controller would.
#[derive(Default)]
pub struct MockIrqController {
    lines: Mutex<MockLines>,
}

impl MockIrqController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `line`. Runs the handler if the line is requested and enabled.
    ///
    /// Returns whether a handler ran.
    pub fn fire(&self, line: IrqLine) -> bool {
        let handler = {
            let mut lines = self.lines.lock();
            if !lines.enabled.contains(&line) {
                trace!("irq {} latched while disabled", line.name());
                lines.pending.insert(line);
                return false;
            }
            lines.handlers.get(&line).cloned()
        };
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_requested(&self, line: IrqLine) -> bool {
        self.lines.lock().handlers.contains_key(&line)
    }

    #[must_use]
    pub fn is_enabled(&self, line: IrqLine) -> bool {
        self.lines.lock().enabled.contains(&line)
    }

    #[must_use]
    pub fn is_pending(&self, line: IrqLine) -> bool {
        self.lines.lock().pending.contains(&line)
    }

    /// Make the next requests of `line` fail.
    pub fn fail_request(&self, line: IrqLine) {
        self.lines.lock().failing.insert(line);
    }

    pub fn set_pending(&self, line: IrqLine) {
        self.lines.lock().pending.insert(line);
    }

    /// Run `hook` every time `line` is enabled, after the line is live.
    ///
    /// This is how a test plays the firmware: "when the host enables CFG_REQ,
    /// raise it".
    pub fn on_enable<F>(&self, line: IrqLine, hook: F)
    where
        F: Fn(&MockIrqController) + Send + Sync + 'static,
    {
        self.lines.lock().hooks.insert(line, Arc::new(hook));
    }

    #[must_use]
    pub fn events(&self) -> Vec<IrqEvent> {
        self.lines.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lines.lock().events.clear();
    }
}

impl IrqController for MockIrqController {
    fn request(&self, line: IrqLine, handler: IrqHandler) -> MifResult<()> {
        let mut lines = self.lines.lock();
        lines.events.push(IrqEvent::Request(line));
        if lines.failing.contains(&line) {
            return Err(MifError::IrqRequestFailed { line });
        }
        lines.handlers.insert(line, handler);
        lines.enabled.insert(line);
        debug!("irq {} requested", line.name());
        Ok(())
    }

    fn free(&self, line: IrqLine) {
        let mut lines = self.lines.lock();
        lines.events.push(IrqEvent::Free(line));
        lines.handlers.remove(&line);
        lines.enabled.remove(&line);
        lines.pending.remove(&line);
    }

    fn enable(&self, line: IrqLine) {
        let (deliver, hook) = {
            let mut lines = self.lines.lock();
            lines.events.push(IrqEvent::Enable(line));
            if !lines.handlers.contains_key(&line) {
                return;
            }
            lines.enabled.insert(line);
            (lines.pending.remove(&line), lines.hooks.get(&line).cloned())
        };
        if deliver {
            self.fire(line);
        }
        if let Some(hook) = hook {
            hook(self);
        }
    }

    fn disable(&self, line: IrqLine) {
        let mut lines = self.lines.lock();
        lines.events.push(IrqEvent::Disable(line));
        lines.enabled.remove(&line);
    }

    fn clear_pending(&self, line: IrqLine) -> bool {
        let mut lines = self.lines.lock();
        lines.events.push(IrqEvent::ClearPending(line));
        lines.pending.remove(&line)
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counter(irq: &MockIrqController, line: IrqLine) -> Arc<AtomicU32> {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        irq.request(
            line,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        count
    }

    #[test]
    fn test_disabled_line_latches_and_delivers_on_enable() {
        let irq = MockIrqController::new();
        let count = counter(&irq, IrqLine::CfgReq);

        irq.disable(IrqLine::CfgReq);
        assert!(!irq.fire(IrqLine::CfgReq));
        assert!(irq.is_pending(IrqLine::CfgReq));

        irq.enable(IrqLine::CfgReq);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!irq.is_pending(IrqLine::CfgReq));
    }

    #[test]
    fn test_clear_pending_drops_edge() {
        let irq = MockIrqController::new();
        let count = counter(&irq, IrqLine::Wdog);
        irq.disable(IrqLine::Wdog);
        irq.fire(IrqLine::Wdog);

        assert!(irq.clear_pending(IrqLine::Wdog));
        irq.enable(IrqLine::Wdog);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_request_leaves_line_free() {
        let irq = MockIrqController::new();
        irq.fail_request(IrqLine::Alive);

        assert_eq!(
            irq.request(IrqLine::Alive, Arc::new(|| {})),
            Err(MifError::IrqRequestFailed {
                line: IrqLine::Alive
            })
        );
        assert!(!irq.is_requested(IrqLine::Alive));
    }

    #[test]
    fn test_enable_hook_can_fire_line() {
        let irq = MockIrqController::new();
        let count = counter(&irq, IrqLine::CfgReq);
        irq.disable(IrqLine::CfgReq);
        irq.on_enable(IrqLine::CfgReq, |irq| {
            irq.fire(IrqLine::CfgReq);
        });

        irq.enable(IrqLine::CfgReq);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
