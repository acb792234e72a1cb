//! Timing and signalling primitives for interrupt-driven handshakes
//!
//! The WLBT boot handshake blocks the caller until an interrupt handler on
//! another context signals it, and polls status registers until a deadline.
//! Both need a notion of time that tests can control, so everything here is
//! written against the [`Clock`] trait rather than a hardware timer.
//!
//! - [`Completion`]: one-shot (counting) signal, safe to raise from interrupt context
//! - [`Clock`] / [`Instant`]: monotonic time source and instant arithmetic
//! - [`poll_timeout`]: bounded register polling
//! - [`FakeClock`]: manually advanced clock for deterministic tests

#![no_std]

mod clock;
mod completion;
mod poll;

pub use clock::{Clock, FakeClock, Instant};
pub use completion::Completion;
pub use poll::{Poll, poll_timeout};
