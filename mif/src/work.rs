//! Deferred CFG_REQ handling
//!
//! Programming the address windows takes a few dozen register writes. Some
//! integrations prefer to leave the interrupt handler quickly and do that work
//! from a worker; [`CfgReqStrategy::Deferred`] hands it to a [`WorkScheduler`].

use alloc::sync::{Arc, Weak};
use core::fmt::{Debug, Formatter};

use crate::platform::PlatformMif;

/// Pending CFG_REQ programming for one transport.
#[derive(Clone)]
pub struct CfgWork(pub(crate) Weak<PlatformMif>);

impl CfgWork {
    /// Run the programming. Does nothing if the work was cancelled or the
    /// transport is gone.
    pub fn run(self) {
        if let Some(mif) = self.0.upgrade() {
            mif.run_deferred_cfg_work();
        }
    }
}

impl Debug for CfgWork {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("CfgWork").finish_non_exhaustive()
    }
}

/// Something that runs work items outside interrupt context.
pub trait WorkScheduler: Send + Sync {
    fn schedule(&self, work: CfgWork);

    /// Drop work that has not started yet.
    fn cancel(&self) {}
}

#[derive(Clone, Default)]
pub enum CfgReqStrategy {
    /// Program the windows from the interrupt handler.
    #[default]
    Direct,
    Deferred(Arc<dyn WorkScheduler>),
}

impl Debug for CfgReqStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            CfgReqStrategy::Direct => write!(f, "Direct"),
            CfgReqStrategy::Deferred(_) => write!(f, "Deferred"),
        }
    }
}

/// Scheduler that queues work until [`QueueScheduler::run_pending`] is called.
#[derive(Default)]
pub struct QueueScheduler {
    queue: spin::Mutex<alloc::collections::VecDeque<CfgWork>>,
}

impl QueueScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Run everything queued so far. Returns how many items ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(work) = self.queue.lock().pop_front() else {
                return ran;
            };
            work.run();
            ran += 1;
        }
    }
}

impl WorkScheduler for QueueScheduler {
    fn schedule(&self, work: CfgWork) {
        self.queue.lock().push_back(work);
    }

    fn cancel(&self) {
        self.queue.lock().clear();
    }
}
