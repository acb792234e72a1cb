use core::sync::atomic::{AtomicU8, Ordering, fence};

/// Progress of the power-on handshake.
///
/// Moves forward only; the power-down path and [`crate::MifTransport::restart`]
/// are the only ways back to [`BootState::InReset`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum BootState {
    InReset = 0,
    WaitingForCfgRequest = 1,
    AckingCfgRequest = 2,
    CfgDone = 3,
    CfgError = 4,
}

impl BootState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => BootState::WaitingForCfgRequest,
            2 => BootState::AckingCfgRequest,
            3 => BootState::CfgDone,
            4 => BootState::CfgError,
            _ => BootState::InReset,
        }
    }
}

/// [`BootState`] shared between the caller of `reset` and the CFG_REQ handler.
#[derive(Debug)]
pub struct AtomicBootState(AtomicU8);

impl AtomicBootState {
    #[must_use]
    pub const fn new(state: BootState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[must_use]
    pub fn load(&self) -> BootState {
        BootState::from_raw(self.0.load(Ordering::Acquire))
    }

    /// Publish `state`. The full fence orders it before any register write
    /// that follows, so an interrupt raised by that write observes it.
    pub fn store(&self, state: BootState) {
        self.0.store(state as u8, Ordering::Release);
        fence(Ordering::SeqCst);
    }
}
