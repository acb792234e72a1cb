//! Bus address window programming
//!
//! A BAAW translates a range of the subsystem's address space onto AP physical
//! memory or peripherals. Each window is four registers at a fixed stride:
//! start, end, remap target and access control. Addresses are programmed as
//! 4 KiB page numbers.

use bitflags::bitflags;
use log::{debug, error};
use scsc_regmap::Regmap;

use crate::{MifError, MifResult};

mod reg {
    pub const START: u32 = 0x0;
    pub const END: u32 = 0x4;
    pub const REMAP: u32 = 0x8;
    pub const ACCESS_CTRL: u32 = 0xC;
    pub const STRIDE: u32 = 0x10;
}

pub const PAGE_SHIFT: u32 = 12;

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct AccessCtrl: u32 {
        const EN_READ = 1 << 0;
        const EN_WRITE = 1 << 1;
        const INIT_DONE = 1 << 31;

        const ENABLED = Self::EN_READ.bits() | Self::EN_WRITE.bits() | Self::INIT_DONE.bits();
    }
}

/// One address window in subsystem address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressWindow {
    pub start: u32,
    /// End of the window in the form the variant's bus expects.
    pub end: u32,
    /// AP physical address `start` maps to.
    pub remap: u64,
    pub access: AccessCtrl,
}

impl AddressWindow {
    #[must_use]
    pub const fn new(start: u32, end: u32, remap: u64) -> Self {
        Self {
            start,
            end,
            remap,
            access: AccessCtrl::ENABLED,
        }
    }

    /// Page number of `remap`, as written to the REMAP register.
    pub fn remap_page(&self) -> MifResult<u32> {
        u32::try_from(self.remap >> PAGE_SHIFT)
            .map_err(|_| MifError::InvalidConfig("window remap target above 44-bit range"))
    }
}

/// Program window `index` of the BAAW behind `map`.
pub fn program(map: &dyn Regmap, index: u32, window: &AddressWindow) -> MifResult<()> {
    if window.end < window.start {
        return Err(MifError::InvalidConfig("window ends before it starts"));
    }
    let remap = window.remap_page()?;
    let base = index * reg::STRIDE;

    let result = map
        .write(base + reg::START, window.start >> PAGE_SHIFT)
        .and_then(|()| map.write(base + reg::END, window.end >> PAGE_SHIFT))
        .and_then(|()| map.write(base + reg::REMAP, remap))
        .and_then(|()| map.write(base + reg::ACCESS_CTRL, window.access.bits()));
    if let Err(err) = result {
        error!("{}: window {index} programming failed: {err}", map.name());
        return Err(err.into());
    }

    debug!(
        "{}: window {index} {:#010x}..={:#010x} -> {:#x}",
        map.name(),
        window.start,
        window.end,
        window.remap
    );
    Ok(())
}

/// Program `windows` into consecutive slots starting at 0.
pub fn program_all<'a>(
    map: &dyn Regmap,
    windows: impl IntoIterator<Item = &'a AddressWindow>,
) -> MifResult<()> {
    windows
        .into_iter()
        .zip(0..)
        .try_for_each(|(window, index)| program(map, index, window))
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use scsc_regmap::mock::MockRegmap;

    use super::*;

    #[test]
    fn test_window_registers_in_order() {
        let map = MockRegmap::new("dbus_baaw");
        let window = AddressWindow::new(0x8000_0000, 0x807f_ffff, 0x9000_0000);

        program(&map, 0, &window).unwrap();
        assert_eq!(
            map.writes(),
            vec![
                (0x0, 0x80000),
                (0x4, 0x807ff),
                (0x8, 0x90000),
                (0xC, 0x8000_0003)
            ]
        );
    }

    #[test]
    fn test_consecutive_windows_use_stride() {
        let map = MockRegmap::new("pbus_baaw");
        let windows = [
            AddressWindow::new(0xA000_0000, 0xA000_FFFF, 0x10F5_0000),
            AddressWindow::new(0xA001_0000, 0xA005_FFFF, 0x10FA_0000),
        ];

        program_all(&map, &windows).unwrap();
        assert_eq!(map.writes_to(0x10), vec![0xA0010]);
        assert_eq!(map.writes_to(0x18), vec![0x10FA0]);
    }

    #[test]
    fn test_write_failure_stops_window() {
        let map = MockRegmap::new("pbus_baaw");
        map.fail_writes_at(0x8);

        let err = program(&map, 0, &AddressWindow::new(0, 0xfff, 0)).unwrap_err();
        assert!(matches!(err, MifError::RegisterAccessFailed(_)));
        assert!(map.writes_to(0xC).is_empty());
    }

    #[test]
    fn test_remap_target_must_fit() {
        let map = MockRegmap::new("dbus_baaw");
        let window = AddressWindow::new(0, 0xfff, 1 << 45);

        assert!(program(&map, 0, &window).is_err());
        assert!(map.writes().is_empty());
    }
}
