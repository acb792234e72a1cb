//! `pcie`: the pcie transport over heap memory standing in for DMA.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use scsc_mbox::IntgenId;
use scsc_mif::intrbit::MifIntrBit;
use scsc_mif::irq::MockIrqController;
use scsc_mif::memory::HeapMemory;
use scsc_mif::panicmon::PanicMonitor;
use scsc_mif::pcie::{PcieConfig, PcieMif, RESET_REQUEST_SOURCE};
use scsc_mif::{IrqTarget, MifTransport};
use scsc_regmap::mock::MockRegmap;

use super::print_writes;
use crate::host::{ConsoleManager, StdClock};

pub fn run() -> Result<ExitCode> {
    let bar0 = Arc::new(MockRegmap::new("bar0"));
    let mif = PcieMif::new(
        PcieConfig::default(),
        bar0.clone(),
        Arc::new(HeapMemory::new(0x4000_0000)),
        Arc::new(MockIrqController::new()),
    );
    let monitor = PanicMonitor::new(Arc::new(ConsoleManager), Arc::new(StdClock::new()));
    monitor.init(&*mif);

    mif.reset(false).context("releasing endpoint reset")?;
    let (handle, len) = mif.map().context("mapping DMA memory")?;
    println!(
        "{} {:#x} bytes for clients at dma {:#x}",
        "pcie".cyan().bold(),
        len,
        handle.phys()
    );

    let intr = MifIntrBit::init(mif.clone());
    let mut tohost = Vec::new();
    for service in ["mxlog", "fw_panic"] {
        let owner = mif.clone();
        let bit = intr.alloc_tohost(Arc::new(move |bit| {
            println!("  {} bit {bit} -> {service}", "dispatch".green());
            if let Err(err) = owner.irq_bit_clear(bit) {
                println!("  failed to clear bit {bit}: {err}");
            }
        }))?;
        println!("to-host bit {bit} allocated for {service}");
        tohost.push(bit);
    }
    let fromhost = intr.alloc_fromhost(IrqTarget::R4)?;
    println!("from-host bit {fromhost} allocated on R4");
    println!("bitmaps {:?}", intr.bitmaps());

    for &bit in tohost.iter().rev() {
        println!("firmware raises bit {bit}");
        mif.emulate_firmware_interrupt(bit)?;
    }
    println!("pending after dispatch 0x{:08x}", mif.irq_get());

    // The firmware listens on its R4 generator.
    if let Some(mbox) = mif.mailbox_block() {
        mbox.unmask_source(IntgenId::R4, fromhost)?;
    }
    bar0.clear_log();
    mif.irq_bit_set(fromhost, IrqTarget::R4)?;
    print_writes(&bar0);

    println!("firmware requests a reset");
    mif.emulate_firmware_interrupt(RESET_REQUEST_SOURCE)?;

    for bit in tohost {
        intr.free_tohost(bit)?;
    }
    intr.free_fromhost(fromhost, IrqTarget::R4)?;
    intr.deinit();
    monitor.deinit(&*mif);
    mif.unmap(handle);
    mif.reset(true).context("asserting endpoint reset")?;
    Ok(ExitCode::SUCCESS)
}
