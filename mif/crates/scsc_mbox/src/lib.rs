//! PCIe mailbox and interrupt-generator emulation
//!
//! The platform transport gets a mailbox block and per-core interrupt
//! generators from silicon. Over PCIe neither exists, so both are emulated in
//! a block at the end of the shared DMA region that the WLBT firmware reads
//! and writes too:
//!
//! ```text
//! +--------------------+ 0x000
//! | mailbox[32]  u32   |
//! +--------------------+ 0x080
//! | magic        u32   |
//! | version      u32   |
//! +--------------------+ 0x088
//! | intgen[AP]         |  mask[32] u32, status[32] u32
//! | intgen[R4]         |
//! | intgen[M4]         |
//! | intgen[M4_1]       |
//! +--------------------+ 0x488
//! ```
//!
//! Every word is little-endian. Each interrupt source owns one mask word and
//! one status word, so the block never needs bit arithmetic; bitmasks only
//! appear when [`PcieMbox::pending_bitmask`] summarises a generator for the
//! transport interface.

#![no_std]

extern crate alloc;

mod intgen;
mod layout;

pub use intgen::{IntgenId, PcieMbox, SourceState, Trigger};
pub use layout::{
    INTGEN_COUNT, IntgenBlock, MAILBOX_COUNT, MBOX_MAGIC, MBOX_RESERVED_LEN, MBOX_VERSION,
    MailboxBlock, SOURCE_COUNT,
};
use thiserror::Error;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum MboxError {
    #[error("interrupt source {0} out of range")]
    SourceOutOfRange(u32),
    #[error("mailbox {0} out of range")]
    MailboxOutOfRange(u32),
    #[error("region of {available} bytes cannot hold the {needed} byte mailbox block")]
    RegionTooSmall { needed: usize, available: usize },
}

pub type MboxResult<T> = Result<T, MboxError>;
