//! PCIe transport
//!
//! The subsystem sits behind a PCIe endpoint. Shared memory is a DMA
//! allocation whose bus address is handed to the device through BAR0, and the
//! mailbox block with its interrupt generators is emulated at the end of that
//! allocation (see [`scsc_mbox`]). Firmware-to-host interrupts arrive as the
//! AP generator's trigger; host-to-firmware interrupts ring a NEWMSG doorbell.
//!
//! The endpoint has no reset-request line, so AP source
//! [`RESET_REQUEST_SOURCE`] stands in for it.

use alloc::sync::{Arc, Weak};
use core::ops::Deref;
use core::ptr::NonNull;

use log::{debug, error, info, warn};
use scsc_mbox::{IntgenId, MBOX_RESERVED_LEN, PcieMbox, Trigger};
use scsc_regmap::Regmap;
use spin::{Mutex, RwLock};

use crate::handler::HandlerSlot;
use crate::irq::{IrqController, IrqLine};
use crate::memory::{Region, SharedMemory};
use crate::{
    BackendKind, IrqTarget, MailboxRef, MemoryHandle, MifError, MifHandler, MifRamRef, MifResult,
    MifTransport, RegisterDump,
};

pub mod bar;

/// AP interrupt source emulating the reset-request line.
pub const RESET_REQUEST_SOURCE: u32 = 31;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PcieConfig {
    /// Bytes of DMA memory allocated at map time, mailbox block included.
    pub prealloc_len: usize,
    /// Bytes offered to clients, counted from the start of the allocation.
    pub alloc_len: usize,
    /// When false, `reset(true)` leaves the endpoint alone.
    pub enable_arm_reset: bool,
}

impl PcieConfig {
    pub const DEFAULT_PREALLOC_LEN: usize = 4 * 1024 * 1024;
    pub const DEFAULT_ALLOC_LEN: usize = Self::DEFAULT_PREALLOC_LEN - MBOX_RESERVED_LEN;
}

impl Default for PcieConfig {
    fn default() -> Self {
        Self {
            prealloc_len: Self::DEFAULT_PREALLOC_LEN,
            alloc_len: Self::DEFAULT_ALLOC_LEN,
            enable_arm_reset: true,
        }
    }
}

/// The emulated mailbox block and the DMA region it lives in.
///
/// The region goes back to [`SharedMemory`] when the last reference drops, so
/// a block handed out by [`PcieMif::mailbox_block`] stays valid after `unmap`.
pub struct MappedMbox {
    mbox: PcieMbox,
    region: Region,
    memory: Arc<dyn SharedMemory>,
}

impl MappedMbox {
    /// The DMA region backing the block.
    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }
}

impl Deref for MappedMbox {
    type Target = PcieMbox;

    fn deref(&self) -> &PcieMbox {
        &self.mbox
    }
}

impl Drop for MappedMbox {
    fn drop(&mut self) {
        self.memory.release(self.region);
        info!("freed dma memory at {:#x}", self.region.phys);
    }
}

pub struct PcieMif {
    me: Weak<PcieMif>,
    config: PcieConfig,
    bar0: Arc<dyn Regmap>,
    memory: Arc<dyn SharedMemory>,
    irq: Arc<dyn IrqController>,

    mbox: RwLock<Option<Arc<MappedMbox>>>,
    mapped: Mutex<Option<Region>>,

    mif_handler: HandlerSlot<dyn Fn() + Send + Sync>,
    reset_request_handler: HandlerSlot<dyn Fn() + Send + Sync>,
}

impl PcieMif {
    #[must_use]
    pub fn new(
        config: PcieConfig,
        bar0: Arc<dyn Regmap>,
        memory: Arc<dyn SharedMemory>,
        irq: Arc<dyn IrqController>,
    ) -> Arc<Self> {
        info!(
            "pcie: {:#x} byte DMA region, {:#x} for clients",
            config.prealloc_len, config.alloc_len
        );
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            bar0,
            memory,
            irq,
            mbox: RwLock::new(None),
            mapped: Mutex::new(None),
            mif_handler: HandlerSlot::new("mif"),
            reset_request_handler: HandlerSlot::new("reset_request"),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PcieConfig {
        &self.config
    }

    /// The emulated mailbox block, once mapped.
    #[must_use]
    pub fn mailbox_block(&self) -> Option<Arc<MappedMbox>> {
        self.mbox.read().clone()
    }

    fn mbox(&self) -> MifResult<Arc<MappedMbox>> {
        self.mailbox_block().ok_or(MifError::NotMapped)
    }

    /// Raise to-host source `bit` the way the firmware does.
    pub fn emulate_firmware_interrupt(&self, bit: u32) -> MifResult<()> {
        self.mbox()?.set_source(IntgenId::Ap, bit)?;
        Ok(())
    }

    /// Interrupt service routine of the AP generator.
    pub fn isr(&self) {
        let Some(mbox) = self.mailbox_block() else {
            warn!("pcie interrupt while unmapped");
            return;
        };
        debug!(
            "MIF interrupt (pending 0x{:08x}, mask 0x{:08x})",
            mbox.pending_bitmask(IntgenId::Ap),
            mbox.masked_bitmask(IntgenId::Ap)
        );

        if mbox.is_source_pending(IntgenId::Ap, RESET_REQUEST_SOURCE) {
            if !self.reset_request_handler.invoke() {
                debug!("reset request with no handler");
            }
            if let Err(err) = mbox.clear_source(IntgenId::Ap, RESET_REQUEST_SOURCE) {
                error!("failed to clear reset request source: {err}");
            }
        }

        if !self.mif_handler.invoke() {
            info!("no MIF handler registered");
        }
    }

    fn doorbell(&self, offset: u32) -> Trigger {
        let bar0 = self.bar0.clone();
        Arc::new(move || {
            if let Err(err) = bar0.write(offset, bar::DOORBELL) {
                error!("doorbell write failed: {err}");
            }
        })
    }

    fn ap_trigger(&self) -> Trigger {
        let me = self.me.clone();
        Arc::new(move || {
            if let Some(mif) = me.upgrade() {
                mif.isr();
            }
        })
    }

    fn arm_reset_request(mbox: &PcieMbox) {
        let armed = mbox
            .clear_source(IntgenId::Ap, RESET_REQUEST_SOURCE)
            .and_then(|()| mbox.unmask_source(IntgenId::Ap, RESET_REQUEST_SOURCE));
        if let Err(err) = armed {
            error!("failed to arm reset request source: {err}");
        }
    }

    /// Hand `region` to the endpoint and build the mailbox block in it. On
    /// error the region is still the caller's to release.
    fn map_region(&self, region: Region) -> MifResult<PcieMbox> {
        let Ok(dma) = u32::try_from(region.phys) else {
            error!("dma address {:#x} is out of the endpoint's reach", region.phys);
            return Err(MifError::MappingFailed);
        };
        self.bar0.write(bar::reg::OFFSET, dma)?;
        let readback = self.bar0.read(bar::reg::OFFSET)?;
        if readback != dma {
            error!("BAR0 OFFSET reads 0x{readback:08x}, expected 0x{dma:08x}");
            return Err(MifError::NoDevice { what: "BAR0 shared base" });
        }

        let triggers = [
            self.ap_trigger(),
            self.doorbell(bar::reg::NEWMSG),
            self.doorbell(bar::reg::NEWMSG2),
            self.doorbell(bar::reg::NEWMSG3),
        ];
        let offset = region.len - MBOX_RESERVED_LEN;
        let base = NonNull::new(region.virt.as_ptr().wrapping_add(offset))
            .ok_or(MifError::MappingFailed)?;
        // SAFETY: `base` lies `MBOX_RESERVED_LEN` bytes before the end of the
        // region. The caller wraps the block in a `MappedMbox`, which holds
        // the region until the block is dropped.
        let mbox = unsafe { PcieMbox::init(base, MBOX_RESERVED_LEN, triggers)? };
        debug!(
            "mailbox block at +{offset:#x}, magic 0x{:08x} version {}",
            mbox.magic(),
            mbox.version()
        );
        Ok(mbox)
    }

    fn check_bit(bit: u32) -> MifResult<()> {
        if bit >= scsc_mbox::SOURCE_COUNT as u32 {
            error!("incorrect INT number: {bit}");
            return Err(MifError::OutOfRange {
                index: bit,
                limit: scsc_mbox::SOURCE_COUNT as u32,
            });
        }
        Ok(())
    }

    fn mapped_region(&self) -> Option<Region> {
        *self.mapped.lock()
    }
}

impl MifTransport for PcieMif {
    fn kind(&self) -> BackendKind {
        BackendKind::Pcie
    }

    fn reset(&self, assert: bool) -> MifResult<()> {
        if assert && !self.config.enable_arm_reset {
            info!("not resetting pcie endpoint, arm reset disabled");
            return Ok(());
        }

        self.bar0.write(bar::reg::SIGNATURE, bar::SIGNATURE_MAGIC)?;
        let signature = self.bar0.read(bar::reg::SIGNATURE)?;
        if signature != bar::SIGNATURE_MAGIC {
            error!(
                "BAR0 SIGNATURE reads 0x{signature:08x}, expected 0x{:08x}",
                bar::SIGNATURE_MAGIC
            );
            return Err(MifError::NoDevice { what: "BAR0 signature" });
        }

        self.bar0.write(bar::reg::GRST, u32::from(assert))?;
        info!("GRST {}", if assert { "asserted" } else { "released" });
        Ok(())
    }

    fn map(&self) -> MifResult<(MemoryHandle, usize)> {
        let mut mapped = self.mapped.lock();
        if mapped.is_some() {
            error!("shared memory already mapped");
            return Err(MifError::AlreadyMapped);
        }
        if self.config.alloc_len > self.config.prealloc_len.saturating_sub(1)
            || self.config.prealloc_len < MBOX_RESERVED_LEN
        {
            error!(
                "alloc_len {:#x} does not fit in prealloc_len {:#x}",
                self.config.alloc_len, self.config.prealloc_len
            );
            return Err(MifError::InvalidConfig("alloc_len exceeds prealloc_len"));
        }

        let region = self.memory.acquire(None, self.config.prealloc_len)?;
        let mbox = match self.map_region(region) {
            Ok(mbox) => Arc::new(MappedMbox {
                mbox,
                region,
                memory: self.memory.clone(),
            }),
            Err(err) => {
                error!("pcie map failed: {err}");
                self.memory.release(region);
                return Err(err);
            }
        };
        if !self.reset_request_handler.is_default() {
            Self::arm_reset_request(&mbox);
        }
        *self.mbox.write() = Some(mbox);

        if let Err(err) = self.irq.request(IrqLine::Mbox, self.ap_trigger()) {
            error!("irq registration failed: {err}");
            // Dropping the block releases the region.
            *self.mbox.write() = None;
            return Err(err);
        }

        *mapped = Some(region);
        info!("mapped {:#x} bytes at dma {:#x}", region.len, region.phys);
        Ok((
            MemoryHandle::new(region.virt, region.phys, region.len),
            self.config.alloc_len,
        ))
    }

    fn unmap(&self, handle: MemoryHandle) {
        let region = self.mapped.lock().take();
        self.irq.free(IrqLine::Mbox);
        let Some(mbox) = self.mbox.write().take() else {
            warn!("unmap without a mapped region");
            return;
        };

        for n in 0..scsc_mbox::SOURCE_COUNT as u32 {
            if let Err(err) = mbox.mask_source(IntgenId::Ap, n) {
                error!("failed to mask AP source {n}: {err}");
            }
        }
        if region.is_some_and(|region| region.virt != handle.as_ptr()) {
            warn!("unmap handle does not match the mapped region");
        }
        if Arc::strong_count(&mbox) > 1 {
            debug!("mailbox block still referenced, dma memory freed on last drop");
        }
    }

    fn get_mailbox_ptr(&self, index: u32) -> Option<MailboxRef> {
        let mbox = self.mailbox_block()?;
        let ptr = mbox.mailbox_slot(index).ok()?;
        Some(MailboxRef::Shared { index, ptr })
    }

    fn mailbox_get(&self, mbox: MailboxRef) -> MifResult<u32> {
        match mbox {
            MailboxRef::Shared { index, .. } => Ok(self.mbox()?.read_mailbox(index)?),
            MailboxRef::Register { .. } => Err(MifError::Unsupported),
        }
    }

    fn mailbox_set(&self, mbox: MailboxRef, value: u32) -> MifResult<()> {
        match mbox {
            MailboxRef::Shared { index, .. } => Ok(self.mbox()?.write_mailbox(index, value)?),
            MailboxRef::Register { .. } => Err(MifError::Unsupported),
        }
    }

    fn irq_get(&self) -> u32 {
        self.mailbox_block()
            .map_or(0, |mbox| mbox.pending_bitmask(IntgenId::Ap))
    }

    fn irq_bit_mask_status_get(&self) -> u32 {
        self.mailbox_block()
            .map_or(0, |mbox| mbox.masked_bitmask(IntgenId::Ap))
    }

    fn irq_bit_set(&self, bit: u32, target: IrqTarget) -> MifResult<()> {
        Self::check_bit(bit)?;
        let id = match target {
            IrqTarget::R4 => IntgenId::R4,
            IrqTarget::M4 => IntgenId::M4,
            IrqTarget::M4_1 => IntgenId::M4_1,
        };
        self.mbox()?.set_source(id, bit)?;
        Ok(())
    }

    fn irq_bit_clear(&self, bit: u32) -> MifResult<()> {
        Self::check_bit(bit)?;
        self.mbox()?.clear_source(IntgenId::Ap, bit)?;
        Ok(())
    }

    fn irq_bit_mask(&self, bit: u32) -> MifResult<()> {
        Self::check_bit(bit)?;
        self.mbox()?.mask_source(IntgenId::Ap, bit)?;
        Ok(())
    }

    fn irq_bit_unmask(&self, bit: u32) -> MifResult<()> {
        Self::check_bit(bit)?;
        self.mbox()?.unmask_source(IntgenId::Ap, bit)?;
        Ok(())
    }

    fn register_interrupt_handler(&self, handler: MifHandler) {
        self.mif_handler.install(handler);
    }

    fn unregister_interrupt_handler(&self) {
        self.mif_handler.restore_default();
    }

    fn register_reset_request_handler(&self, handler: MifHandler) {
        self.reset_request_handler.install(handler);
        if let Some(mbox) = self.mailbox_block() {
            Self::arm_reset_request(&mbox);
        }
    }

    fn unregister_reset_request_handler(&self) {
        if let Some(mbox) = self.mailbox_block() {
            if let Err(err) = mbox.mask_source(IntgenId::Ap, RESET_REQUEST_SOURCE) {
                error!("failed to mask reset request source: {err}");
            }
        }
        self.reset_request_handler.restore_default();
    }

    fn mifram_ref(&self, ptr: *const u8) -> MifResult<MifRamRef> {
        let region = self.mapped_region().ok_or(MifError::NotMapped)?;
        match region.offset_of(ptr) {
            Some(offset) if offset < self.config.alloc_len => Ok(MifRamRef(offset as u32)),
            _ => {
                error!("{ptr:p} outside the client area");
                Err(MifError::OutOfRange {
                    index: (ptr as usize).wrapping_sub(region.virt.as_ptr() as usize) as u32,
                    limit: self.config.alloc_len as u32,
                })
            }
        }
    }

    fn mifram_ptr(&self, mref: MifRamRef) -> Option<NonNull<u8>> {
        let region = self.mapped_region()?;
        let offset = mref.0 as usize;
        if offset >= self.config.alloc_len {
            error!("mifram ref {offset:#x} out of range");
            return None;
        }
        NonNull::new(region.virt.as_ptr().wrapping_add(offset))
    }

    fn mifram_phys(&self, mref: MifRamRef) -> Option<u64> {
        let region = self.mapped_region()?;
        ((mref.0 as usize) < self.config.alloc_len).then(|| region.phys + u64::from(mref.0))
    }

    fn mifram_pfn(&self) -> Option<u64> {
        self.mapped_region()
            .map(|region| region.phys >> crate::baaw::PAGE_SHIFT)
    }

    fn dump_registers(&self) -> RegisterDump {
        RegisterDump {
            entries: bar::dump(&*self.bar0),
        }
    }

    fn cleanup(&self) {
        self.mif_handler.restore_default();
        self.reset_request_handler.restore_default();
    }
}
