//! Exynos9630 WLBT PMU sequencing

use core::time::Duration;

use super::variant::{
    BusRange, ChipVersionRule, PmuReg, PmuStep, Timeouts, Variant, VariantConfig,
};
use crate::baaw::AddressWindow;

pub mod reg {
    use super::PmuReg;

    pub const WLBT_STAT: PmuReg = PmuReg::pmu(0x0058, "WLBT_STAT");
    pub const WLBT_DEBUG: PmuReg = PmuReg::pmu(0x005C, "WLBT_DEBUG");
    pub const WLBT_CONFIGURATION: PmuReg = PmuReg::pmu(0x3300, "WLBT_CONFIGURATION");
    pub const WLBT_STATUS: PmuReg = PmuReg::pmu(0x3304, "WLBT_STATUS");
    pub const WLBT_STATES: PmuReg = PmuReg::pmu(0x3308, "WLBT_STATES");
    pub const WLBT_OPTION: PmuReg = PmuReg::pmu(0x330C, "WLBT_OPTION");
    pub const WLBT_CTRL_NS: PmuReg = PmuReg::pmu(0x3310, "WLBT_CTRL_NS");
    pub const WLBT_CTRL_S: PmuReg = PmuReg::pmu(0x3314, "WLBT_CTRL_S");
    pub const WLBT_OUT: PmuReg = PmuReg::pmu(0x3320, "WLBT_OUT");
    pub const WLBT_IN: PmuReg = PmuReg::pmu(0x3324, "WLBT_IN");
    pub const WLBT_INT_IN: PmuReg = PmuReg::pmu(0x3340, "WLBT_INT_IN");
    pub const WLBT_INT_EN: PmuReg = PmuReg::pmu(0x3344, "WLBT_INT_EN");
    pub const WLBT_INT_TYPE: PmuReg = PmuReg::pmu(0x3348, "WLBT_INT_TYPE");
    pub const WLBT_INT_DIR: PmuReg = PmuReg::pmu(0x3348, "WLBT_INT_DIR");
    pub const WAKEUP_INT_TYPE: PmuReg = PmuReg::pmu(0x3948, "WAKEUP_INT_TYPE");
    pub const SYSTEM_OUT: PmuReg = PmuReg::pmu(0x3A20, "SYSTEM_OUT");
    pub const VGPIO_TX_MONITOR: PmuReg = PmuReg::pmic_apm(0x1700, "VGPIO_TX_MONITOR");

    pub const LOCAL_PWR_CFG: u32 = 1 << 0;
    pub const WLBT_STATUS_ON: u32 = 1 << 0;
    pub const WLBT_OPTION_DATA: u32 = 1 << 3;
    pub const WLBT_ACTIVE_EN: u32 = 1 << 7;
    pub const WLBT_ACTIVE_CLR: u32 = 1 << 8;
    pub const WLBT_START: u32 = 1 << 3;
    pub const BUS_READY: u32 = 1 << 4;
    pub const RESETREQ_WLBT: u32 = 1 << 18;
    pub const PWRRGTON_CON: u32 = 1 << 9;
    pub const VGPIO_TX_MON_BIT29: u32 = 1 << 29;
}

use reg::*;

static POWER_ON: [PmuStep; 14] = [
    PmuStep::set(WLBT_CTRL_S, WLBT_START).first_boot_only(),
    PmuStep::set(WLBT_OPTION, WLBT_OPTION_DATA),
    PmuStep::set(SYSTEM_OUT, PWRRGTON_CON),
    PmuStep::poll(
        VGPIO_TX_MONITOR,
        VGPIO_TX_MON_BIT29,
        VGPIO_TX_MON_BIT29,
        "PMIC power rail",
    )
    .advisory(),
    PmuStep::Delay(Duration::from_millis(1)),
    PmuStep::CleanCfgReqPending,
    PmuStep::set(WLBT_CONFIGURATION, LOCAL_PWR_CFG),
    PmuStep::poll(WLBT_STATUS, WLBT_STATUS_ON, WLBT_STATUS_ON, "power on"),
    PmuStep::Read { reg: WLBT_STATES },
    PmuStep::poll(WLBT_IN, BUS_READY, BUS_READY, "bus ready"),
    PmuStep::clear(WLBT_CTRL_NS, WLBT_ACTIVE_CLR).advisory(),
    PmuStep::set(WLBT_CTRL_NS, WLBT_ACTIVE_EN).advisory(),
    PmuStep::EnableCfgReq,
    PmuStep::WaitCfgReq,
];

static POWER_DOWN: [PmuStep; 4] = [
    PmuStep::clear(WLBT_CTRL_NS, WLBT_ACTIVE_EN).advisory(),
    PmuStep::ForceWrite {
        reg: WLBT_CONFIGURATION,
        mask: LOCAL_PWR_CFG,
        value: 0,
        policy: super::variant::Policy::Required,
    },
    PmuStep::poll(WLBT_STATUS, WLBT_STATUS_ON, 0, "power down"),
    PmuStep::Read { reg: WLBT_STATES },
];

static HOLD_FAIL_SAFE: [PmuStep; 1] = [PmuStep::ForceWrite {
    reg: WLBT_CONFIGURATION,
    mask: LOCAL_PWR_CFG,
    value: 0,
    policy: super::variant::Policy::Advisory,
}];

static PERIPHERAL_WINDOWS: [AddressWindow; 7] = [
    // CP2WLBT mailbox
    AddressWindow::new(0xA000_0000, 0xA000_FFFF, 0x10F5_0000),
    // GNSS, APM, AP, ABOX and CHUB mailboxes
    AddressWindow::new(0xA001_0000, 0xA005_FFFF, 0x10FA_0000),
    AddressWindow::new(0xA006_0000, 0xA009_FFFF, 0x1143_0000),
    AddressWindow::new(0xA00A_0000, 0xA00C_FFFF, 0x1149_0000),
    AddressWindow::new(0xA00D_0000, 0xA015_FFFF, 0x1150_0000),
    AddressWindow::new(0xA016_0000, 0xA01B_FFFF, 0x11B7_0000),
    AddressWindow::new(0xA01C_0000, 0xA01E_FFFF, 0x11A0_0000),
];

static REGDUMP: [PmuReg; 16] = [
    WLBT_STAT,
    WLBT_DEBUG,
    WLBT_CONFIGURATION,
    WLBT_STATUS,
    WLBT_STATES,
    WLBT_OPTION,
    WLBT_CTRL_NS,
    WLBT_CTRL_S,
    WLBT_OUT,
    WLBT_IN,
    WLBT_INT_IN,
    WLBT_INT_EN,
    WLBT_INT_TYPE,
    WLBT_INT_DIR,
    SYSTEM_OUT,
    VGPIO_TX_MONITOR,
];

/// Boot ROM patch loaded while the AP owns the boot RAM.
static BOOT_PATCH: [u32; 46] = [
    0xe875_0002, 0x1189_113f, 0x0e80_7558, 0xe030_b3e5, 0x11a2_30fb, 0xb1f5_0774, 0x75fd_b2b5,
    0x0774_00b1, 0xadb5_acf5, 0x01b4_43fd, 0xe020_b3e5, 0xfeb4_53fb, 0xd880_a3d2, 0x8379_8278,
    0xa075_d280, 0x7837_7907, 0x0754_e6b0, 0x8002_07b4, 0x04f6_d90b, 0x7580_f5c4, 0x0380_00af,
    0x2209_8075, 0x53f7_f753, 0x0479_fece, 0xce53_fed9, 0xd90c_79fd, 0xfbce_53fe, 0x53b7_9275,
    0x0074_fd91, 0xce53_92f5, 0xb792_75f7, 0x5302_f943, 0xf922_fef9, 0xfbd8_fed9, 0x019e_7522,
    0x7501_d275, 0xc175_80d5, 0x7404_7880, 0x8380_12c3, 0x78c0_c175, 0x1282_7402, 0x8075_8380,
    0x0291_750d, 0x7503_9375, 0xa975_029e, 0x0000_2201,
];

#[must_use]
pub fn config() -> VariantConfig {
    VariantConfig {
        variant: Variant::Exynos9630,
        num_mbox: 4,
        power_on: &POWER_ON,
        power_down: &POWER_DOWN,
        hold_fail_safe: &HOLD_FAIL_SAFE,
        pre_cfg: &[],
        post_ack: &[],
        dram_window: BusRange {
            start: 0x8000_0000,
            end: 0x8100_0000,
        },
        peripheral_windows: &PERIPHERAL_WINDOWS,
        remap_offset: 0x400,
        chip_version: ChipVersionRule::SocRevision { offset: 0x410 },
        boot_patch: &BOOT_PATCH,
        patch_base: 0x1000,
        wakeup_int_type: Some((WAKEUP_INT_TYPE, RESETREQ_WLBT)),
        active_clr: Some((WLBT_CTRL_NS, WLBT_ACTIVE_CLR)),
        stat_reg: WLBT_STAT,
        regdump: &REGDUMP,
        timeouts: Timeouts::default(),
    }
}
