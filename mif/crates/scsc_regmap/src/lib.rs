//! Register map access
//!
//! Every hardware block the WLBT transport touches (PMU, BAAW windows, boot
//! configuration RAM, mailbox, PCIe BAR0) is reached through a [`Regmap`]: an
//! opaque handle offering 32-bit reads and writes at byte offsets. Accesses
//! report failure instead of silently succeeding, so callers can abort a
//! sequence on the first bad write.
//!
//! Two implementations live here:
//!
//! | Type | Backing |
//! |------|---------|
//! | [`MmioRegmap`] | volatile accesses to a mapped register window |
//! | [`mock::MockRegmap`] | in-memory registers that record every access |

#![no_std]

extern crate alloc;

mod mmio;
pub mod mock;

pub use mmio::MmioRegmap;
use thiserror::Error;

/// Register access errors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum RegmapError {
    #[error("read of register 0x{offset:04x} failed")]
    Read { offset: u32 },
    #[error("write of register 0x{offset:04x} failed")]
    Write { offset: u32 },
    #[error("register 0x{offset:04x} is outside of the 0x{len:x} byte window")]
    OutOfBounds { offset: u32, len: usize },
}

/// Result type for register accesses.
pub type RegmapResult<T> = Result<T, RegmapError>;

/// Access to a block of 32-bit registers.
///
/// Implementations must be usable from interrupt context: no sleeping and no
/// locks held across calls.
pub trait Regmap: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Read the register at `offset`.
    fn read(&self, offset: u32) -> RegmapResult<u32>;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: u32, value: u32) -> RegmapResult<()>;

    /// Replace the bits selected by `mask` with the same bits of `value`.
    ///
    /// The write is skipped when the register already holds the result.
    fn update_bits(&self, offset: u32, mask: u32, value: u32) -> RegmapResult<()> {
        let old = self.read(offset)?;
        let new = (old & !mask) | (value & mask);
        if new == old {
            return Ok(());
        }
        self.write(offset, new)
    }

    /// Like [`Regmap::update_bits`], but always issues the write.
    fn write_bits(&self, offset: u32, mask: u32, value: u32) -> RegmapResult<()> {
        let old = self.read(offset)?;
        self.write(offset, (old & !mask) | (value & mask))
    }

    fn set_bits(&self, offset: u32, bits: u32) -> RegmapResult<()> {
        self.update_bits(offset, bits, bits)
    }

    fn clear_bits(&self, offset: u32, bits: u32) -> RegmapResult<()> {
        self.update_bits(offset, bits, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Access, MockRegmap};
    use super::*;

    #[test]
    fn test_update_bits_skips_unchanged_write() {
        let map = MockRegmap::new("pmu").with_value(0x10, 0b1010);

        map.update_bits(0x10, 0b0010, 0b0010).unwrap();
        assert!(map.writes().is_empty());

        map.update_bits(0x10, 0b0011, 0b0001).unwrap();
        assert_eq!(map.writes(), alloc::vec![(0x10, 0b1001)]);
    }

    #[test]
    fn test_write_bits_always_writes() {
        let map = MockRegmap::new("pmu").with_value(0x20, 0x1);

        map.write_bits(0x20, 0x1, 0x1).unwrap();
        assert_eq!(map.writes(), alloc::vec![(0x20, 0x1)]);
    }

    #[test]
    fn test_set_and_clear_bits() {
        let map = MockRegmap::new("pmu");

        map.set_bits(0x4, 1 << 3).unwrap();
        assert_eq!(map.get(0x4), 1 << 3);
        map.clear_bits(0x4, 1 << 3).unwrap();
        assert_eq!(map.get(0x4), 0);
        assert!(matches!(map.accesses()[0], Access::Read { offset: 0x4, .. }));
    }

    #[test]
    fn test_update_bits_propagates_read_failure() {
        let map = MockRegmap::new("pmu");
        map.fail_reads_at(0x8);

        assert_eq!(
            map.update_bits(0x8, 1, 1),
            Err(RegmapError::Read { offset: 0x8 })
        );
        assert!(map.writes().is_empty());
    }
}
