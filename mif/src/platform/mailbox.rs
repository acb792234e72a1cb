//! Silicon mailbox of the platform transport
//!
//! Register 0 of each pair faces the AP, register 1 faces the subsystem. Only
//! the upper 16 bits of INTxR0 carry to-host interrupts; the lower 16 bits of
//! INTxR1 carry from-host interrupts.

use log::{debug, info};
use scsc_regmap::{Regmap, RegmapResult};

use crate::RegisterValue;

mod reg {
    pub const INTGR0: u32 = 0x008;
    pub const INTCR0: u32 = 0x00C;
    pub const INTMR0: u32 = 0x010;
    pub const INTSR0: u32 = 0x014;
    pub const INTMSR0: u32 = 0x018;
    pub const INTGR1: u32 = 0x01c;
    pub const INTCR1: u32 = 0x020;
    pub const INTMR1: u32 = 0x024;
    pub const INTSR1: u32 = 0x028;
    pub const INTMSR1: u32 = 0x02c;
    pub const ISSR_BASE: u32 = 0x080;
}

/// Interrupt bits per direction.
pub const MAILBOX_BITS: u32 = 16;

const TO_HOST_SHIFT: u32 = 16;
const TO_HOST_ALL: u32 = 0xffff_0000;
const FROM_HOST_ALL: u32 = 0x0000_ffff;

const DUMP: [(&str, u32); 10] = [
    ("INTGR0", reg::INTGR0),
    ("INTCR0", reg::INTCR0),
    ("INTMR0", reg::INTMR0),
    ("INTSR0", reg::INTSR0),
    ("INTMSR0", reg::INTMSR0),
    ("INTGR1", reg::INTGR1),
    ("INTCR1", reg::INTCR1),
    ("INTMR1", reg::INTMR1),
    ("INTSR1", reg::INTSR1),
    ("INTMSR1", reg::INTMSR1),
];

#[must_use]
pub const fn issr(index: u32) -> u32 {
    reg::ISSR_BASE + 4 * index
}

/// Clear every shared register, then mask and clear every interrupt.
pub fn init(map: &dyn Regmap, num_mbox: u32) -> RegmapResult<()> {
    for index in 0..num_mbox {
        map.write(issr(index), 0)?;
    }
    map.write(reg::INTMR0, TO_HOST_ALL)?;
    map.write(reg::INTMR1, FROM_HOST_ALL)?;
    map.write(reg::INTCR0, TO_HOST_ALL)?;
    map.write(reg::INTCR1, FROM_HOST_ALL)?;
    debug!("{}: {num_mbox} mailboxes cleared, all interrupts masked", map.name());
    Ok(())
}

pub fn mask_all(map: &dyn Regmap) -> RegmapResult<()> {
    map.write(reg::INTMR0, TO_HOST_ALL)?;
    map.write(reg::INTMR1, FROM_HOST_ALL)
}

pub fn clear_all(map: &dyn Regmap) -> RegmapResult<()> {
    map.write(reg::INTCR0, TO_HOST_ALL)?;
    map.write(reg::INTCR1, FROM_HOST_ALL)
}

/// To-host bits that are pending and unmasked.
pub fn pending(map: &dyn Regmap) -> RegmapResult<u32> {
    Ok(map.read(reg::INTMSR0)? >> TO_HOST_SHIFT)
}

pub fn mask_status(map: &dyn Regmap) -> RegmapResult<u32> {
    Ok(map.read(reg::INTMR0)? >> TO_HOST_SHIFT)
}

pub fn raise(map: &dyn Regmap, bit: u32) -> RegmapResult<()> {
    map.write(reg::INTGR1, 1 << bit)
}

pub fn clear(map: &dyn Regmap, bit: u32) -> RegmapResult<()> {
    map.write(reg::INTCR0, (1 << bit) << TO_HOST_SHIFT)
}

/// Caller serialises mask updates.
pub fn set_masked(map: &dyn Regmap, bit: u32, masked: bool) -> RegmapResult<()> {
    let bits = (1 << bit) << TO_HOST_SHIFT;
    let old = map.read(reg::INTMR0)?;
    let new = if masked { old | bits } else { old & !bits };
    map.write(reg::INTMR0, new)
}

pub fn saved_mask(map: &dyn Regmap) -> RegmapResult<u32> {
    map.read(reg::INTMR0)
}

pub fn restore_mask(map: &dyn Regmap, value: u32) -> RegmapResult<()> {
    map.write(reg::INTMR0, value)
}

pub fn dump(map: &dyn Regmap) -> impl Iterator<Item = (&'static str, RegisterValue)> + '_ {
    DUMP.into_iter().map(move |(name, offset)| {
        let value = map
            .read(offset)
            .map_or(RegisterValue::Unreadable, RegisterValue::Read);
        info!("{name} {value}");
        (name, value)
    })
}
