//! `boot`: power-on through the platform transport.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use log::warn;
use scsc_mif::irq::{IrqLine, MockIrqController};
use scsc_mif::memory::HeapMemory;
use scsc_mif::panicmon::PanicMonitor;
use scsc_mif::platform::exynos9610::reg as r9610;
use scsc_mif::platform::exynos9630::reg as r9630;
use scsc_mif::platform::{
    HostServices, PlatformConfig, PlatformMif, PlatformRegmaps, VariantConfig, exynos9610,
    exynos9630,
};
use scsc_mif::work::CfgReqStrategy;
use scsc_mif::{MifTransport, RegisterId};
use scsc_regmap::mock::MockRegmap;

use super::print_writes;
use crate::Soc;
use crate::host::{ConsoleManager, StdClock, ThreadScheduler};

const MEM_SIZE: usize = 0x40_0000;

pub struct BootOptions {
    pub variant: Soc,
    pub mem_start: u64,
    /// Whether the simulated subsystem answers with CFG_REQ.
    pub cfg_req: bool,
    pub deferred: bool,
}

/// A PMU that acknowledges power requests the way the silicon does.
fn pmu(variant: Soc) -> MockRegmap {
    match variant {
        Soc::Exynos9630 => {
            let pmu = MockRegmap::new("pmu").with_value(r9630::WLBT_IN.offset, r9630::BUS_READY);
            pmu.on_write(r9630::WLBT_CONFIGURATION.offset, |value, regs| {
                let status = regs.entry(r9630::WLBT_STATUS.offset).or_insert(0);
                if value & r9630::LOCAL_PWR_CFG != 0 {
                    *status |= r9630::WLBT_STATUS_ON;
                } else {
                    *status &= !r9630::WLBT_STATUS_ON;
                }
            });
            pmu
        }
        Soc::Exynos9610 => MockRegmap::new("pmu").with_value(
            r9610::CENTRAL_SEQ_WLBT_STATUS.offset,
            r9610::STATES_POWER_DOWN,
        ),
    }
}

fn variant_config(variant: Soc) -> VariantConfig {
    match variant {
        Soc::Exynos9630 => exynos9630::config(),
        Soc::Exynos9610 => exynos9610::config(),
    }
}

pub fn run(options: &BootOptions) -> Result<ExitCode> {
    let dbus = Arc::new(MockRegmap::new("dbus_baaw"));
    let pbus = Arc::new(MockRegmap::new("pbus_baaw"));
    let remap = Arc::new(MockRegmap::new("remap"));
    let boot_cfg = Arc::new(MockRegmap::new("boot_cfg"));
    let regs = PlatformRegmaps {
        pmu: Arc::new(pmu(options.variant)),
        pmic_apm: Some(Arc::new(
            MockRegmap::new("pmic_apm")
                .with_value(r9630::VGPIO_TX_MONITOR.offset, r9630::VGPIO_TX_MON_BIT29),
        )),
        mailbox: Arc::new(MockRegmap::new("mailbox")),
        dbus_baaw: dbus.clone(),
        pbus_baaw: pbus.clone(),
        remap: remap.clone(),
        boot_cfg: boot_cfg.clone(),
    };

    let irq = Arc::new(MockIrqController::new());
    if options.cfg_req {
        // The boot ROM asks for its windows as soon as the host listens.
        irq.on_enable(IrqLine::CfgReq, |irq| {
            irq.fire(IrqLine::CfgReq);
        });
    }
    let clock = Arc::new(StdClock::new());
    let host = HostServices {
        irq,
        memory: Arc::new(HeapMemory::default()),
        clock: clock.clone(),
    };

    let mut config = PlatformConfig::new(options.mem_start, MEM_SIZE);
    if options.deferred {
        config = config.with_cfg_req(CfgReqStrategy::Deferred(Arc::new(
            ThreadScheduler::default(),
        )));
    }

    let mif = PlatformMif::new(variant_config(options.variant), config, regs, host)
        .context("creating platform transport")?;
    let monitor = PanicMonitor::new(Arc::new(ConsoleManager), clock);
    monitor.init(&*mif);

    let (handle, len) = mif.map().context("mapping shared memory")?;
    println!(
        "{} {:#x} bytes at {:#x}",
        mif.variant().variant.name().cyan().bold(),
        len,
        handle.phys()
    );

    let outcome = mif.reset(false);
    print_writes(&dbus);
    print_writes(&pbus);
    print_writes(&remap);
    print_writes(&boot_cfg);

    let code = match outcome {
        Ok(()) => {
            let stat = mif.read_register(RegisterId::WlbtStat)?;
            println!(
                "{} state {:?}, WLBT_STAT 0x{stat:08x}",
                "booted".green().bold(),
                mif.boot_state()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{} {err} (state {:?})", "boot failed".red().bold(), mif.boot_state());
            monitor.report_boot_failure(&err);
            ExitCode::FAILURE
        }
    };

    if let Err(err) = mif.reset(true) {
        warn!("failed to hold WLBT in reset: {err}");
    }
    monitor.deinit(&*mif);
    mif.unmap(handle);
    Ok(code)
}
