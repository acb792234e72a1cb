//! Exynos9610 WLBT PMU sequencing
//!
//! Power is sequenced by the central sequencer. The AP takes ownership of the
//! power request while the subsystem is configured and hands it back once
//! CFG_REQ has been acknowledged.

use core::time::Duration;

use super::variant::{
    BusRange, ChipVersionRule, PmuReg, PmuStep, Timeouts, Variant, VariantConfig,
};
use crate::baaw::AddressWindow;

pub mod reg {
    use super::PmuReg;

    pub const WLBT_CTRL_NS: PmuReg = PmuReg::pmu(0x0050, "WLBT_CTRL_NS");
    pub const WLBT_CTRL_S: PmuReg = PmuReg::pmu(0x0054, "WLBT_CTRL_S");
    pub const WLBT_STAT: PmuReg = PmuReg::pmu(0x0058, "WLBT_STAT");
    pub const WLBT_DEBUG: PmuReg = PmuReg::pmu(0x005C, "WLBT_DEBUG");
    pub const CENTRAL_SEQ_WLBT_CONFIGURATION: PmuReg =
        PmuReg::pmu(0x0180, "CENTRAL_SEQ_WLBT_CONFIGURATION");
    pub const CENTRAL_SEQ_WLBT_STATUS: PmuReg = PmuReg::pmu(0x0184, "CENTRAL_SEQ_WLBT_STATUS");
    pub const RESET_AHEAD_WLBT_SYS_PWR_REG: PmuReg =
        PmuReg::pmu(0x1360, "RESET_AHEAD_WLBT_SYS_PWR_REG");
    pub const CLEANY_BUS_WLBT_SYS_PWR_REG: PmuReg =
        PmuReg::pmu(0x1364, "CLEANY_BUS_WLBT_SYS_PWR_REG");
    pub const LOGIC_RESET_WLBT_SYS_PWR_REG: PmuReg =
        PmuReg::pmu(0x1368, "LOGIC_RESET_WLBT_SYS_PWR_REG");
    pub const TCXO_GATE_WLBT_SYS_PWR_REG: PmuReg =
        PmuReg::pmu(0x136C, "TCXO_GATE_WLBT_SYS_PWR_REG");
    pub const WLBT_DISABLE_ISO_SYS_PWR_REG: PmuReg =
        PmuReg::pmu(0x1370, "WLBT_DISABLE_ISO_SYS_PWR_REG");
    pub const WLBT_RESET_ISO_SYS_PWR_REG: PmuReg =
        PmuReg::pmu(0x1374, "WLBT_RESET_ISO_SYS_PWR_REG");

    pub const WLBT_RESET_SET: u32 = 1 << 0;
    pub const WLBT_ACTIVE_CLR: u32 = 1 << 6;
    pub const MASK_PWR_REQ: u32 = 1 << 18;
    pub const WLBT_START: u32 = 1 << 0;
    pub const SYS_PWR_CFG: u32 = 1 << 0;
    pub const SYS_PWR_CFG_2: u32 = (1 << 0) | (1 << 1);
    pub const SYS_PWR_CFG_16: u32 = 1 << 16;
    pub const STATES: u32 = 0x00ff_0000;
    /// Sequencer state once the subsystem is fully powered down.
    pub const STATES_POWER_DOWN: u32 = 0x80 << 16;
}

use reg::*;

static POWER_ON: [PmuStep; 5] = [
    PmuStep::set(WLBT_CTRL_NS, MASK_PWR_REQ),
    PmuStep::clear(WLBT_CTRL_NS, WLBT_RESET_SET),
    PmuStep::set(WLBT_CTRL_S, WLBT_START),
    PmuStep::EnableCfgReq,
    PmuStep::WaitCfgReq,
];

static POWER_DOWN: [PmuStep; 12] = [
    // Power control goes back to the AP while the subsystem goes down.
    PmuStep::set(WLBT_CTRL_NS, MASK_PWR_REQ),
    PmuStep::clear(CENTRAL_SEQ_WLBT_CONFIGURATION, SYS_PWR_CFG_16),
    PmuStep::clear(RESET_AHEAD_WLBT_SYS_PWR_REG, SYS_PWR_CFG_2),
    PmuStep::clear(CLEANY_BUS_WLBT_SYS_PWR_REG, SYS_PWR_CFG),
    PmuStep::clear(LOGIC_RESET_WLBT_SYS_PWR_REG, SYS_PWR_CFG_2),
    PmuStep::clear(TCXO_GATE_WLBT_SYS_PWR_REG, SYS_PWR_CFG),
    PmuStep::set(WLBT_DISABLE_ISO_SYS_PWR_REG, SYS_PWR_CFG),
    PmuStep::clear(WLBT_RESET_ISO_SYS_PWR_REG, SYS_PWR_CFG),
    PmuStep::set(WLBT_CTRL_NS, WLBT_RESET_SET),
    PmuStep::poll(CENTRAL_SEQ_WLBT_STATUS, STATES, STATES_POWER_DOWN, "power down"),
    PmuStep::Read {
        reg: CENTRAL_SEQ_WLBT_STATUS,
    },
    PmuStep::clear(WLBT_CTRL_NS, MASK_PWR_REQ),
];

static HOLD_FAIL_SAFE: [PmuStep; 2] = [
    PmuStep::set(WLBT_CTRL_NS, WLBT_RESET_SET).advisory(),
    PmuStep::clear(WLBT_CTRL_NS, MASK_PWR_REQ).advisory(),
];

static PRE_CFG: [PmuStep; 1] = [PmuStep::Delay(Duration::from_micros(100))];

static POST_ACK: [PmuStep; 2] = [
    PmuStep::Delay(Duration::from_micros(100)),
    PmuStep::clear(WLBT_CTRL_NS, MASK_PWR_REQ),
];

static PERIPHERAL_WINDOWS: [AddressWindow; 6] = [
    AddressWindow::new(0xA000_0000, 0xA001_0000, 0x1195_0000),
    AddressWindow::new(0xA001_0000, 0xA006_0000, 0x119A_0000),
    AddressWindow::new(0xA006_0000, 0xA010_0000, 0x11D0_0000),
    AddressWindow::new(0xA010_0000, 0xA011_0000, 0x11C8_0000),
    AddressWindow::new(0xA011_0000, 0xA012_0000, 0x11C2_0000),
    AddressWindow::new(0xA012_0000, 0xA016_0000, 0x1120_0000),
];

static REGDUMP: [PmuReg; 6] = [
    CENTRAL_SEQ_WLBT_STATUS,
    CENTRAL_SEQ_WLBT_CONFIGURATION,
    WLBT_CTRL_NS,
    WLBT_CTRL_S,
    WLBT_STAT,
    WLBT_DEBUG,
];

/// Boot ROM patch loaded while the AP owns the boot RAM.
static BOOT_PATCH: [u32; 58] = [
    0x9075_0002, 0x11a4_c218, 0x7567_1191, 0x9075_e090, 0x54b3_e5e7, 0x30f7_6001, 0xb143_15a2,
    0xb4b2_e503, 0xb153_fb03, 0xa901_85fc, 0xacf5_0774, 0x75fd_adb5, 0xb475_08a0, 0x54b3_e501,
    0x75fa_7001, 0x9075_00b4, 0x78cb_8018, 0x8083_7982, 0x07a0_75c5, 0xb078_3779, 0xb407_54e6,
    0x0b80_0207, 0xc404_f6d9, 0xaf75_90f5, 0x7503_8000, 0x5322_9090, 0xce53_eff7, 0xd904_79fe,
    0xfdce_53fe, 0xfed9_0c79, 0x75fb_ce53, 0x9153_0b92, 0xf7ce_53fd, 0x5308_f943, 0xf922_fef9,
    0xfbd8_fed9, 0x019e_7522, 0x75cf_c175, 0xc375_a4c2, 0x47c4_754a, 0x75a4_c575, 0xc775_6dc6,
    0x03d2_7540, 0x7510_d375, 0xca75_00c9, 0x00cb_75d0, 0x7500_cc75, 0x9b75_009a, 0x009c_75c0,
    0x7800_9d75, 0x1282_7402, 0xc643_8b80, 0x7409_7802, 0x8b80_12e7, 0x75d0_9075, 0x9e75_0291,
    0x01a9_7502, 0x0000_0022,
];

/// EMA value the subsystem expects in CHIP_VERSION_ID.
pub const EMA: u32 = (1 << 20) | (1 << 18) | (1 << 13) | (1 << 11) | (1 << 5) | (1 << 2);

#[must_use]
pub fn config() -> VariantConfig {
    VariantConfig {
        variant: Variant::Exynos9610,
        num_mbox: 8,
        power_on: &POWER_ON,
        power_down: &POWER_DOWN,
        hold_fail_safe: &HOLD_FAIL_SAFE,
        pre_cfg: &PRE_CFG,
        post_ack: &POST_ACK,
        dram_window: BusRange {
            start: 0x8000_0000,
            end: 0x8100_0000,
        },
        peripheral_windows: &PERIPHERAL_WINDOWS,
        remap_offset: 0x0,
        chip_version: ChipVersionRule::Ema {
            offset: 0x10,
            value: EMA,
        },
        boot_patch: &BOOT_PATCH,
        patch_base: 0x1000,
        wakeup_int_type: None,
        active_clr: Some((WLBT_CTRL_NS, WLBT_ACTIVE_CLR)),
        stat_reg: WLBT_STAT,
        regdump: &REGDUMP,
        timeouts: Timeouts::default(),
    }
}
