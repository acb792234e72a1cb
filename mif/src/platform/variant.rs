//! Per-SoC description of the PMU handshake
//!
//! The power sequences of the supported SoCs differ in which registers are
//! touched and in what order, not in how a step is carried out. A variant is
//! therefore a table of [`PmuStep`]s plus window tables and constants, and
//! [`super::PlatformMif`] interprets it.

use core::time::Duration;

use bitfield::bitfield;

use crate::baaw::AddressWindow;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Variant {
    Exynos9610,
    Exynos9630,
}

impl Variant {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Variant::Exynos9610 => "exynos9610",
            Variant::Exynos9630 => "exynos9630",
        }
    }
}

/// Register block a [`PmuReg`] lives in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegSpace {
    Pmu,
    /// APM side of the PMIC interface. Not present on every board.
    PmicApm,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PmuReg {
    pub space: RegSpace,
    pub offset: u32,
    pub name: &'static str,
}

impl PmuReg {
    #[must_use]
    pub const fn pmu(offset: u32, name: &'static str) -> Self {
        Self {
            space: RegSpace::Pmu,
            offset,
            name,
        }
    }

    #[must_use]
    pub const fn pmic_apm(offset: u32, name: &'static str) -> Self {
        Self {
            space: RegSpace::PmicApm,
            offset,
            name,
        }
    }
}

/// What a failing step does to the sequence.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Policy {
    /// Abort the sequence.
    Required,
    /// Log and carry on.
    Advisory,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PmuStep {
    /// Read-modify-write, skipped when nothing changes.
    Update {
        reg: PmuReg,
        mask: u32,
        value: u32,
        policy: Policy,
        /// Only on the first power-on of this transport instance.
        first_boot_only: bool,
    },
    /// Read-modify-write that always issues the write.
    ForceWrite {
        reg: PmuReg,
        mask: u32,
        value: u32,
        policy: Policy,
    },
    /// Wait until `reg & mask == expect`, bounded by [`Timeouts::poll`].
    Poll {
        reg: PmuReg,
        mask: u32,
        expect: u32,
        policy: Policy,
        what: &'static str,
    },
    /// Log the register's value.
    Read { reg: PmuReg },
    Delay(Duration),
    /// Drop a CFG_REQ edge latched before the subsystem was powered.
    CleanCfgReqPending,
    EnableCfgReq,
    /// Block until the CFG_REQ handler signals, bounded by [`Timeouts::cfg_req`].
    WaitCfgReq,
}

impl PmuStep {
    #[must_use]
    pub const fn set(reg: PmuReg, bits: u32) -> Self {
        PmuStep::Update {
            reg,
            mask: bits,
            value: bits,
            policy: Policy::Required,
            first_boot_only: false,
        }
    }

    #[must_use]
    pub const fn clear(reg: PmuReg, bits: u32) -> Self {
        PmuStep::Update {
            reg,
            mask: bits,
            value: 0,
            policy: Policy::Required,
            first_boot_only: false,
        }
    }

    /// Same step, but failures are only logged.
    #[must_use]
    pub const fn advisory(self) -> Self {
        match self {
            PmuStep::Update {
                reg,
                mask,
                value,
                first_boot_only,
                ..
            } => PmuStep::Update {
                reg,
                mask,
                value,
                policy: Policy::Advisory,
                first_boot_only,
            },
            PmuStep::ForceWrite {
                reg, mask, value, ..
            } => PmuStep::ForceWrite {
                reg,
                mask,
                value,
                policy: Policy::Advisory,
            },
            PmuStep::Poll {
                reg,
                mask,
                expect,
                what,
                ..
            } => PmuStep::Poll {
                reg,
                mask,
                expect,
                policy: Policy::Advisory,
                what,
            },
            other => other,
        }
    }

    #[must_use]
    pub const fn first_boot_only(self) -> Self {
        match self {
            PmuStep::Update {
                reg,
                mask,
                value,
                policy,
                ..
            } => PmuStep::Update {
                reg,
                mask,
                value,
                policy,
                first_boot_only: true,
            },
            other => other,
        }
    }

    #[must_use]
    pub const fn poll(reg: PmuReg, mask: u32, expect: u32, what: &'static str) -> Self {
        PmuStep::Poll {
            reg,
            mask,
            expect,
            policy: Policy::Required,
            what,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Timeouts {
    pub poll: Duration,
    pub cfg_req: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(500),
            cfg_req: Duration::from_secs(1),
        }
    }
}

bitfield! {
    /// WLBT CHIP_VERSION_ID as seen by the subsystem.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct ChipVersionId(u32);
    impl Debug;
    pub ip_revision, set_ip_revision: 23, 16;
    pub ema, set_ema: 21, 0;
}

impl ChipVersionId {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// How the CFG_REQ handler patches CHIP_VERSION_ID in the remap block.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChipVersionRule {
    None,
    /// Major/minor revision replaced by the AP's SoC revision.
    SocRevision { offset: u32 },
    /// Memory timing (EMA) bits replaced by a fixed value.
    Ema { offset: u32, value: u32 },
}

/// Subsystem-side bus range of the shared DRAM window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BusRange {
    pub start: u32,
    pub end: u32,
}

/// Complete description of one SoC.
#[derive(Debug, Clone)]
pub struct VariantConfig {
    pub variant: Variant,
    /// Number of platform mailbox ISSR registers.
    pub num_mbox: u32,
    pub power_on: &'static [PmuStep],
    pub power_down: &'static [PmuStep],
    /// Run when `power_down` fails part way, to leave the subsystem held in
    /// reset with power control handed back.
    pub hold_fail_safe: &'static [PmuStep],
    /// Run by the CFG_REQ handler before any window is programmed.
    pub pre_cfg: &'static [PmuStep],
    /// Run by the CFG_REQ handler after the acknowledge write.
    pub post_ack: &'static [PmuStep],
    pub dram_window: BusRange,
    pub peripheral_windows: &'static [AddressWindow],
    /// Offset of the remap register in the remap block.
    pub remap_offset: u32,
    pub chip_version: ChipVersionRule,
    pub boot_patch: &'static [u32],
    /// Boot config offset the patch is loaded at.
    pub patch_base: u32,
    /// Register and bit cleared after a reset request was taken.
    pub wakeup_int_type: Option<(PmuReg, u32)>,
    /// Register and bit set on resume.
    pub active_clr: Option<(PmuReg, u32)>,
    pub stat_reg: PmuReg,
    /// Registers logged when the handshake goes wrong.
    pub regdump: &'static [PmuReg],
    pub timeouts: Timeouts,
}

impl VariantConfig {
    /// The DRAM window for a carve-out at `mem_start`.
    #[must_use]
    pub fn dram_window_for(&self, mem_start: u64) -> AddressWindow {
        AddressWindow::new(self.dram_window.start, self.dram_window.end, mem_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REG: PmuReg = PmuReg::pmu(0x10, "TEST");

    #[test]
    fn test_builders_keep_fields() {
        let step = PmuStep::set(REG, 1 << 3).first_boot_only().advisory();

        assert_eq!(
            step,
            PmuStep::Update {
                reg: REG,
                mask: 1 << 3,
                value: 1 << 3,
                policy: Policy::Advisory,
                first_boot_only: true,
            }
        );
        assert_eq!(PmuStep::EnableCfgReq.advisory(), PmuStep::EnableCfgReq);
    }

    #[test]
    fn test_chip_version_fields() {
        let mut id = ChipVersionId(0xA0B0_0000);
        id.set_ip_revision(0x11);

        assert_eq!(id.0, 0xA011_0000);
        assert_eq!(id.ema(), 0x11_0000);
    }
}
