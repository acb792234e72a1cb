//! PCIe transport driven end to end: BAR0 is a mock register file and the
//! emulated mailbox block lives in heap memory standing in for DMA.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use scsc_mbox::IntgenId;
use scsc_mif::irq::{IrqLine, MockIrqController};
use scsc_mif::memory::HeapMemory;
use scsc_mif::pcie::{PcieConfig, PcieMif, RESET_REQUEST_SOURCE, bar};
use scsc_mif::{IrqTarget, MailboxRef, MifError, MifTransport, RegisterValue};
use scsc_regmap::mock::MockRegmap;

struct Rig {
    mif: Arc<PcieMif>,
    bar0: Arc<MockRegmap>,
    irq: Arc<MockIrqController>,
    memory: Arc<HeapMemory>,
}

fn rig() -> Rig {
    let bar0 = Arc::new(MockRegmap::new("bar0"));
    let irq = Arc::new(MockIrqController::new());
    let memory = Arc::new(HeapMemory::new(0x4000_0000));
    let mif = PcieMif::new(
        PcieConfig {
            prealloc_len: 0x8000,
            alloc_len: 0x6000,
            enable_arm_reset: true,
        },
        bar0.clone(),
        memory.clone(),
        irq.clone(),
    );
    Rig {
        mif,
        bar0,
        irq,
        memory,
    }
}

fn counter() -> (Arc<AtomicUsize>, Arc<dyn Fn() + Send + Sync>) {
    let count = Arc::new(AtomicUsize::new(0));
    let bump = count.clone();
    (
        count,
        Arc::new(move || {
            bump.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

#[test]
fn test_map_hands_dma_base_to_endpoint() {
    let rig = rig();

    let (handle, len) = rig.mif.map().unwrap();

    assert_eq!(len, 0x6000);
    assert_eq!(handle.phys(), 0x4000_0000);
    assert_eq!(rig.bar0.get(bar::reg::OFFSET), 0x4000_0000);
    assert!(rig.irq.is_requested(IrqLine::Mbox));
    let mbox = rig.mif.mailbox_block().unwrap();
    assert_eq!(mbox.magic(), scsc_mbox::MBOX_MAGIC);
    // Every to-host source starts out masked.
    assert_eq!(rig.mif.irq_bit_mask_status_get(), u32::MAX);
    assert_eq!(rig.mif.map().map(|_| ()), Err(MifError::AlreadyMapped));
}

#[test]
fn test_offset_readback_mismatch_is_no_device() {
    let rig = rig();
    rig.bar0.on_write(bar::reg::OFFSET, |_, regs| {
        regs.insert(bar::reg::OFFSET, 0);
    });

    assert_eq!(
        rig.mif.map().map(|_| ()),
        Err(MifError::NoDevice { what: "BAR0 shared base" })
    );
    assert_eq!(rig.memory.outstanding(), 0);
    assert!(rig.mif.mailbox_block().is_none());
    assert!(!rig.irq.is_requested(IrqLine::Mbox));
}

#[test]
fn test_pending_needs_set_and_unmasked() {
    let rig = rig();
    rig.mif.map().unwrap();

    rig.mif.emulate_firmware_interrupt(5).unwrap();
    assert_eq!(rig.mif.irq_get(), 0);

    rig.mif.irq_bit_unmask(5).unwrap();
    assert_eq!(rig.mif.irq_get(), 1 << 5);

    rig.mif.irq_bit_mask(5).unwrap();
    assert_eq!(rig.mif.irq_get(), 0);

    rig.mif.irq_bit_unmask(5).unwrap();
    rig.mif.irq_bit_clear(5).unwrap();
    assert_eq!(rig.mif.irq_get(), 0);
}

#[test]
fn test_unmasking_a_raised_source_interrupts_the_host() {
    let rig = rig();
    let (calls, handler) = counter();
    rig.mif.register_interrupt_handler(handler);
    rig.mif.map().unwrap();

    rig.mif.emulate_firmware_interrupt(7).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    rig.mif.irq_bit_unmask(7).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The host line reaches the same routine.
    assert!(rig.irq.fire(IrqLine::Mbox));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_default_handler_leaves_source_pending() {
    let rig = rig();
    rig.mif.map().unwrap();
    rig.mif.irq_bit_unmask(2).unwrap();

    rig.mif.emulate_firmware_interrupt(2).unwrap();

    assert_eq!(rig.mif.irq_get(), 1 << 2);
}

#[test]
fn test_host_to_firmware_interrupts_ring_doorbells() {
    let rig = rig();
    rig.mif.map().unwrap();
    let mbox = rig.mif.mailbox_block().unwrap();
    // The firmware unmasks what it listens to.
    mbox.unmask_source(IntgenId::R4, 3).unwrap();
    mbox.unmask_source(IntgenId::M4, 3).unwrap();
    mbox.unmask_source(IntgenId::M4_1, 3).unwrap();
    rig.bar0.clear_log();

    rig.mif.irq_bit_set(3, IrqTarget::R4).unwrap();
    rig.mif.irq_bit_set(3, IrqTarget::M4).unwrap();
    rig.mif.irq_bit_set(3, IrqTarget::M4_1).unwrap();
    rig.mif.irq_bit_set(4, IrqTarget::R4).unwrap();

    assert_eq!(
        rig.bar0.writes(),
        vec![
            (bar::reg::NEWMSG, bar::DOORBELL),
            (bar::reg::NEWMSG2, bar::DOORBELL),
            (bar::reg::NEWMSG3, bar::DOORBELL),
        ]
    );
    assert!(mbox.is_source_pending(IntgenId::R4, 3));
    assert!(!mbox.is_source_pending(IntgenId::R4, 4));
}

#[test]
fn test_bit_numbers_are_bounded() {
    let rig = rig();
    rig.mif.map().unwrap();

    let out_of_range = Err(MifError::OutOfRange {
        index: 32,
        limit: 32,
    });
    assert_eq!(rig.mif.irq_bit_set(32, IrqTarget::R4), out_of_range);
    assert_eq!(rig.mif.irq_bit_clear(32), out_of_range);
    assert_eq!(rig.mif.irq_bit_mask(32), out_of_range);
    assert_eq!(rig.mif.irq_bit_unmask(32), out_of_range);
}

#[test]
fn test_interrupt_bits_need_a_mapping() {
    let rig = rig();

    assert_eq!(rig.mif.irq_get(), 0);
    assert_eq!(rig.mif.irq_bit_unmask(1), Err(MifError::NotMapped));
    assert_eq!(
        rig.mif.emulate_firmware_interrupt(1),
        Err(MifError::NotMapped)
    );
    assert!(rig.mif.get_mailbox_ptr(0).is_none());
}

#[test]
fn test_reset_request_source_runs_handler_and_clears() {
    let rig = rig();
    let (requests, reset_handler) = counter();
    let (interrupts, mif_handler) = counter();
    rig.mif.register_interrupt_handler(mif_handler);
    rig.mif.map().unwrap();
    rig.mif.register_reset_request_handler(reset_handler);

    rig.mif
        .emulate_firmware_interrupt(RESET_REQUEST_SOURCE)
        .unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert_eq!(interrupts.load(Ordering::SeqCst), 1);
    assert_eq!(rig.mif.irq_get(), 0);

    rig.mif.unregister_reset_request_handler();
    rig.mif
        .emulate_firmware_interrupt(RESET_REQUEST_SOURCE)
        .unwrap();
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reset_request_handler_registered_before_map_is_armed() {
    let rig = rig();
    let (requests, reset_handler) = counter();
    rig.mif.register_reset_request_handler(reset_handler);
    rig.mif.map().unwrap();

    rig.mif
        .emulate_firmware_interrupt(RESET_REQUEST_SOURCE)
        .unwrap();

    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mailboxes_live_in_shared_memory() {
    let rig = rig();
    rig.mif.map().unwrap();

    let slot = rig.mif.get_mailbox_ptr(6).unwrap();
    assert!(matches!(slot, MailboxRef::Shared { index: 6, .. }));
    assert_eq!(rig.mif.mailbox_get(slot), Ok(0));

    rig.mif.mailbox_set(slot, 0x1234_5678).unwrap();
    assert_eq!(rig.mif.mailbox_get(slot), Ok(0x1234_5678));
    assert_eq!(
        rig.mif.mailbox_block().unwrap().read_mailbox(6),
        Ok(0x1234_5678)
    );

    assert!(rig.mif.get_mailbox_ptr(scsc_mbox::MAILBOX_COUNT as u32).is_none());
    assert_eq!(
        rig.mif.mailbox_get(MailboxRef::Register { offset: 0x80 }),
        Err(MifError::Unsupported)
    );
}

#[test]
fn test_unmap_releases_everything() {
    let rig = rig();
    let (handle, _) = rig.mif.map().unwrap();

    rig.mif.unmap(handle);

    assert_eq!(rig.memory.outstanding(), 0);
    assert!(rig.mif.mailbox_block().is_none());
    assert!(!rig.irq.is_requested(IrqLine::Mbox));
    assert_eq!(rig.mif.mifram_pfn(), None);

    // A fresh mapping starts from a clean block.
    rig.mif.map().unwrap();
    assert_eq!(rig.mif.irq_bit_mask_status_get(), u32::MAX);
}

#[test]
fn test_mailbox_block_outlives_unmap() {
    let rig = rig();
    let (handle, _) = rig.mif.map().unwrap();
    let stale = rig.mif.mailbox_block().unwrap();
    rig.mif.irq_bit_unmask(3).unwrap();

    rig.mif.unmap(handle);
    assert_eq!(stale.masked_bitmask(IntgenId::Ap), u32::MAX);
    assert_eq!(rig.memory.outstanding(), 1);

    rig.mif.map().unwrap();
    assert_eq!(rig.memory.outstanding(), 2);
    stale.write_mailbox(0, 0xdead_beef).unwrap();
    assert_eq!(
        rig.mif.mailbox_block().unwrap().read_mailbox(0),
        Ok(0)
    );

    drop(stale);
    assert_eq!(rig.memory.outstanding(), 1);
}

#[test]
fn test_dma_above_4gib_is_rejected() {
    let bar0 = Arc::new(MockRegmap::new("bar0"));
    let memory = Arc::new(HeapMemory::new(0x1_0000_0000));
    let mif = PcieMif::new(
        PcieConfig::default(),
        bar0.clone(),
        memory.clone(),
        Arc::new(MockIrqController::new()),
    );

    assert_eq!(mif.map().map(|_| ()), Err(MifError::MappingFailed));
    assert!(bar0.writes_to(bar::reg::OFFSET).is_empty());
    assert_eq!(memory.outstanding(), 0);
}

#[test]
fn test_register_dump_reports_unreadable_words() {
    let rig = rig();
    rig.bar0.set(bar::reg::FPGAVER, 0x2019_0417);
    rig.bar0.fail_reads_at(bar::reg::RUNEN);

    let dump = rig.mif.dump_registers();

    assert_eq!(dump.get("FPGAVER"), Some(RegisterValue::Read(0x2019_0417)));
    assert_eq!(dump.get("RUNEN"), Some(RegisterValue::Unreadable));
    assert_eq!(dump.get("NEWMSG3"), Some(RegisterValue::Read(0)));
}
