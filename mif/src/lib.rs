//! WLBT memory interface (MIF) transports
//!
//! The AP talks to the WLBT (Wi-Fi/Bluetooth) subsystem through a shared DRAM
//! region, a mailbox block and a handful of interrupt lines. This crate hides
//! how those are provided behind [`MifTransport`]:
//!
//! - [`platform::PlatformMif`]: the subsystem sits on the SoC bus. Powering it
//!   on is a PMU handshake that ends with the subsystem raising CFG_REQ and the
//!   AP programming its address windows ([`baaw`]) before acknowledging.
//! - [`pcie::PcieMif`]: the subsystem sits behind PCIe. The mailbox and
//!   interrupt generators are emulated in shared memory.
//!
//! On top of a transport, [`intrbit::MifIntrBit`] hands out interrupt bits to
//! service clients, [`panicmon::PanicMonitor`] escalates reset requests and
//! [`registry`] connects transports to the drivers that consume them.

#![no_std]

extern crate alloc;

pub mod baaw;
mod error;
pub mod handler;
pub mod intrbit;
pub mod irq;
pub mod memory;
pub mod panicmon;
pub mod pcie;
pub mod platform;
pub mod registry;
mod transport;
pub mod work;

pub use error::{MifError, MifResult};
pub use transport::{
    BackendKind, IrqTarget, MailboxRef, MemoryHandle, MifHandler, MifRamRef, MifTransport,
    RegisterDump, RegisterId, RegisterValue, ResumeHandler, SuspendHandler,
};
