//! Replaceable handler slots
//!
//! A slot starts out holding the default (no handler) and can be swapped from
//! any context. The ISR side clones the handler out under the lock and calls it
//! after the lock is dropped, so a handler may itself re-register.

use alloc::sync::Arc;

use spin::RwLock;

pub struct HandlerSlot<H: ?Sized> {
    name: &'static str,
    slot: RwLock<Option<Arc<H>>>,
}

impl<H: ?Sized> HandlerSlot<H> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn install(&self, handler: Arc<H>) {
        *self.slot.write() = Some(handler);
    }

    pub fn restore_default(&self) {
        *self.slot.write() = None;
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.slot.read().is_none()
    }

    #[must_use]
    pub fn get(&self) -> Option<Arc<H>> {
        self.slot.read().clone()
    }
}

impl HandlerSlot<dyn Fn() + Send + Sync> {
    /// Run the installed handler. Returns `false` if only the default was there.
    pub fn invoke(&self) -> bool {
        match self.get() {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}
