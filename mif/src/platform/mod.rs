//! Platform (memory-mapped) transport
//!
//! The subsystem sits on the SoC bus. Its mailbox is silicon, its shared DRAM
//! is a fixed carve-out and powering it on is a PMU sequence that ends in the
//! CFG_REQ handshake:
//!
//! ```text
//!   AP                                   WLBT
//!   boot_state = WaitingForCfgRequest
//!   power domain on, reset released ---> boots ROM
//!   wait (bounded)                  <--- CFG_REQ
//!     program remap, BAAW windows
//!     load boot patch
//!     boot_state = AckingCfgRequest
//!     CFG_ACK                       ---> continues boot
//!   boot_state = CfgDone, complete
//! ```
//!
//! Everything SoC specific lives in a [`VariantConfig`]; see [`exynos9610`]
//! and [`exynos9630`].

use alloc::sync::{Arc, Weak};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, error, info, warn};
use scsc_regmap::Regmap;
use scsc_sync::{Clock, Completion};
use spin::Mutex;

use crate::handler::HandlerSlot;
use crate::irq::{IrqController, IrqLine};
use crate::memory::{Region, SharedMemory};
use crate::work::CfgReqStrategy;
use crate::{
    BackendKind, IrqTarget, MailboxRef, MemoryHandle, MifError, MifHandler, MifRamRef, MifResult,
    MifTransport, RegisterDump, RegisterId, ResumeHandler, SuspendHandler,
};

mod boot_state;
mod cfg;
pub mod exynos9610;
pub mod exynos9630;
mod isr;
pub mod mailbox;
mod pmu;
mod variant;

pub use boot_state::{AtomicBootState, BootState};
pub use variant::{
    BusRange, ChipVersionId, ChipVersionRule, Policy, PmuReg, PmuStep, RegSpace, Timeouts,
    Variant, VariantConfig,
};

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// AP physical address of the shared DRAM carve-out.
    pub mem_start: u64,
    pub mem_size: usize,
    pub soc_revision: u32,
    /// When false, holding the subsystem in reset is a no-op.
    pub enable_arm_reset: bool,
    pub alive_irq: bool,
    pub cfg_req: CfgReqStrategy,
}

impl PlatformConfig {
    #[must_use]
    pub fn new(mem_start: u64, mem_size: usize) -> Self {
        Self {
            mem_start,
            mem_size,
            soc_revision: 0,
            enable_arm_reset: true,
            alive_irq: false,
            cfg_req: CfgReqStrategy::Direct,
        }
    }

    #[must_use]
    pub fn with_soc_revision(mut self, revision: u32) -> Self {
        self.soc_revision = revision;
        self
    }

    #[must_use]
    pub fn with_arm_reset(mut self, enable: bool) -> Self {
        self.enable_arm_reset = enable;
        self
    }

    #[must_use]
    pub fn with_alive_irq(mut self, enable: bool) -> Self {
        self.alive_irq = enable;
        self
    }

    #[must_use]
    pub fn with_cfg_req(mut self, strategy: CfgReqStrategy) -> Self {
        self.cfg_req = strategy;
        self
    }

    fn validate(&self) -> MifResult<()> {
        if self.mem_size == 0 {
            return Err(MifError::InvalidConfig("shared memory size is zero"));
        }
        if self.mem_start == 0 {
            warn!("shared memory starts at physical address 0");
        }
        Ok(())
    }
}

/// Register blocks the platform transport drives.
#[derive(Clone)]
pub struct PlatformRegmaps {
    pub pmu: Arc<dyn Regmap>,
    pub pmic_apm: Option<Arc<dyn Regmap>>,
    pub mailbox: Arc<dyn Regmap>,
    pub dbus_baaw: Arc<dyn Regmap>,
    pub pbus_baaw: Arc<dyn Regmap>,
    pub remap: Arc<dyn Regmap>,
    pub boot_cfg: Arc<dyn Regmap>,
}

/// Kernel services the transport runs on.
#[derive(Clone)]
pub struct HostServices {
    pub irq: Arc<dyn IrqController>,
    pub memory: Arc<dyn SharedMemory>,
    pub clock: Arc<dyn Clock>,
}

pub struct PlatformMif {
    me: Weak<PlatformMif>,
    variant: VariantConfig,
    config: PlatformConfig,
    regs: PlatformRegmaps,
    host: HostServices,

    boot_state: AtomicBootState,
    cfg_ack: Completion,
    reset_failed: AtomicBool,
    in_reset: AtomicBool,
    init_done: AtomicBool,
    cfg_work_pending: AtomicBool,
    wdog_disabled: AtomicU32,
    saved_intmr0: AtomicU32,

    /// Why the last handshake ended in `CfgError`, for the failure log.
    cfg_error: Mutex<Option<MifError>>,
    mapped: Mutex<Option<Region>>,
    mask_lock: Mutex<()>,
    reset_lock: Mutex<()>,

    mif_handler: HandlerSlot<dyn Fn() + Send + Sync>,
    reset_request_handler: HandlerSlot<dyn Fn() + Send + Sync>,
    suspend_handler: HandlerSlot<dyn Fn() -> MifResult<()> + Send + Sync>,
    resume_handler: HandlerSlot<dyn Fn() + Send + Sync>,
}

impl PlatformMif {
    pub fn new(
        variant: VariantConfig,
        config: PlatformConfig,
        regs: PlatformRegmaps,
        host: HostServices,
    ) -> MifResult<Arc<Self>> {
        config.validate()?;
        info!(
            "{}: shared memory {:#x}+{:#x}, cfg_req {:?}",
            variant.variant.name(),
            config.mem_start,
            config.mem_size,
            config.cfg_req
        );

        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            variant,
            config,
            regs,
            host,
            boot_state: AtomicBootState::new(BootState::InReset),
            cfg_ack: Completion::new(),
            reset_failed: AtomicBool::new(false),
            in_reset: AtomicBool::new(false),
            init_done: AtomicBool::new(false),
            cfg_work_pending: AtomicBool::new(false),
            wdog_disabled: AtomicU32::new(0),
            saved_intmr0: AtomicU32::new(0),
            cfg_error: Mutex::new(None),
            mapped: Mutex::new(None),
            mask_lock: Mutex::new(()),
            reset_lock: Mutex::new(()),
            mif_handler: HandlerSlot::new("mif"),
            reset_request_handler: HandlerSlot::new("reset_request"),
            suspend_handler: HandlerSlot::new("suspend"),
            resume_handler: HandlerSlot::new("resume"),
        }))
    }

    #[must_use]
    pub fn boot_state(&self) -> BootState {
        self.boot_state.load()
    }

    #[must_use]
    pub fn variant(&self) -> &VariantConfig {
        &self.variant
    }

    #[must_use]
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn check_reset_failed(&self) -> MifResult<()> {
        if self.reset_failed.load(Ordering::Acquire) {
            error!("reset previously failed, refusing to touch hardware");
            return Err(MifError::ResetFailed);
        }
        Ok(())
    }

    fn check_bit(bit: u32) -> MifResult<()> {
        if bit >= mailbox::MAILBOX_BITS {
            error!("incorrect INT number: {bit}");
            return Err(MifError::OutOfRange {
                index: bit,
                limit: mailbox::MAILBOX_BITS,
            });
        }
        Ok(())
    }

    fn set_masked(&self, bit: u32, masked: bool) -> MifResult<()> {
        Self::check_bit(bit)?;
        let _guard = self.mask_lock.lock();
        mailbox::set_masked(&*self.regs.mailbox, bit, masked)?;
        Ok(())
    }

    fn mapped_region(&self) -> Option<Region> {
        *self.mapped.lock()
    }
}

impl MifTransport for PlatformMif {
    fn kind(&self) -> BackendKind {
        BackendKind::Platform(self.variant.variant)
    }

    fn reset(&self, assert: bool) -> MifResult<()> {
        self.check_reset_failed()?;
        if assert && !self.config.enable_arm_reset {
            info!("not resetting WLBT, arm reset disabled");
            return Ok(());
        }
        if assert {
            self.hold_reset()
        } else {
            self.release_reset()
        }
    }

    fn map(&self) -> MifResult<(MemoryHandle, usize)> {
        self.check_reset_failed()?;
        let mut mapped = self.mapped.lock();
        if mapped.is_some() {
            error!("shared memory already mapped");
            return Err(MifError::AlreadyMapped);
        }

        let region = self
            .host
            .memory
            .acquire(Some(self.config.mem_start), self.config.mem_size)?;
        if let Err(err) = mailbox::init(&*self.regs.mailbox, self.variant.num_mbox) {
            error!("mailbox init failed: {err}");
            self.host.memory.release(region);
            return Err(err.into());
        }
        if let Err(err) = self.request_irqs() {
            error!("irq registration failed: {err}");
            self.host.memory.release(region);
            return Err(err);
        }

        *mapped = Some(region);
        info!("mapped {:#x} bytes at {:#x}", region.len, region.phys);
        Ok((
            MemoryHandle::new(region.virt, region.phys, region.len),
            region.len,
        ))
    }

    fn unmap(&self, handle: MemoryHandle) {
        let region = self.mapped.lock().take();

        if let Err(err) = mailbox::mask_all(&*self.regs.mailbox) {
            warn!("failed to mask mailbox interrupts: {err}");
        }
        self.free_irqs();
        if let Err(err) = mailbox::clear_all(&*self.regs.mailbox) {
            warn!("failed to clear mailbox interrupts: {err}");
        }

        match region {
            Some(region) => {
                if region.virt != handle.as_ptr() {
                    warn!("unmap handle does not match the mapped region");
                }
                self.host.memory.release(region);
                debug!("unmapped {:#x}", region.phys);
            }
            None => warn!("unmap without a mapped region"),
        }
    }

    fn get_mailbox_ptr(&self, index: u32) -> Option<MailboxRef> {
        if index >= self.variant.num_mbox {
            error!("mailbox {index} out of range");
            return None;
        }
        Some(MailboxRef::Register {
            offset: mailbox::issr(index),
        })
    }

    fn mailbox_get(&self, mbox: MailboxRef) -> MifResult<u32> {
        match mbox {
            MailboxRef::Register { offset } => Ok(self.regs.mailbox.read(offset)?),
            MailboxRef::Shared { .. } => Err(MifError::Unsupported),
        }
    }

    fn mailbox_set(&self, mbox: MailboxRef, value: u32) -> MifResult<()> {
        match mbox {
            MailboxRef::Register { offset } => Ok(self.regs.mailbox.write(offset, value)?),
            MailboxRef::Shared { .. } => Err(MifError::Unsupported),
        }
    }

    fn irq_get(&self) -> u32 {
        mailbox::pending(&*self.regs.mailbox).unwrap_or_else(|err| {
            error!("failed to read INTMSR0: {err}");
            0
        })
    }

    fn irq_bit_mask_status_get(&self) -> u32 {
        mailbox::mask_status(&*self.regs.mailbox).unwrap_or_else(|err| {
            error!("failed to read INTMR0: {err}");
            0
        })
    }

    fn irq_bit_set(&self, bit: u32, target: IrqTarget) -> MifResult<()> {
        Self::check_bit(bit)?;
        mailbox::raise(&*self.regs.mailbox, bit)?;
        debug!("INTGR1 bit {bit} on {target:?}");
        Ok(())
    }

    fn irq_bit_clear(&self, bit: u32) -> MifResult<()> {
        Self::check_bit(bit)?;
        mailbox::clear(&*self.regs.mailbox, bit)?;
        Ok(())
    }

    fn irq_bit_mask(&self, bit: u32) -> MifResult<()> {
        self.set_masked(bit, true)
    }

    fn irq_bit_unmask(&self, bit: u32) -> MifResult<()> {
        self.set_masked(bit, false)
    }

    fn register_interrupt_handler(&self, handler: MifHandler) {
        self.mif_handler.install(handler);
    }

    fn unregister_interrupt_handler(&self) {
        self.mif_handler.restore_default();
    }

    fn register_reset_request_handler(&self, handler: MifHandler) {
        self.reset_request_handler.install(handler);
        if self.wdog_disabled.swap(0, Ordering::AcqRel) > 0 {
            info!("re-enabling WDOG");
            self.host.irq.enable(IrqLine::Wdog);
        }
    }

    fn unregister_reset_request_handler(&self) {
        self.reset_request_handler.restore_default();
    }

    fn register_suspend_handlers(
        &self,
        suspend: SuspendHandler,
        resume: ResumeHandler,
    ) -> MifResult<()> {
        self.suspend_handler.install(suspend);
        self.resume_handler.install(resume);
        Ok(())
    }

    fn unregister_suspend_handlers(&self) {
        self.suspend_handler.restore_default();
        self.resume_handler.restore_default();
    }

    fn suspend(&self) -> MifResult<()> {
        let result = self.suspend_handler.get().map_or(Ok(()), |suspend| suspend());
        match mailbox::saved_mask(&*self.regs.mailbox) {
            Ok(mask) => self.saved_intmr0.store(mask, Ordering::Release),
            Err(err) => warn!("failed to save INTMR0: {err}"),
        }
        if let Err(err) = &result {
            info!("suspend refused: {err}");
        }
        result
    }

    fn resume(&self) {
        let mask = self.saved_intmr0.load(Ordering::Acquire);
        if let Err(err) = mailbox::restore_mask(&*self.regs.mailbox, mask) {
            warn!("failed to restore INTMR0: {err}");
        }
        if let Some((reg, bit)) = self.variant.active_clr {
            if let Err(err) = self.regs.pmu.update_bits(reg.offset, bit, bit) {
                error!("failed to set {}: {err}", reg.name);
            }
        }
        if let Some(resume) = self.resume_handler.get() {
            resume();
        }
    }

    fn mifram_ref(&self, ptr: *const u8) -> MifResult<MifRamRef> {
        let region = self.mapped_region().ok_or(MifError::NotMapped)?;
        let offset = region.offset_of(ptr).ok_or_else(|| {
            error!("{ptr:p} outside shared memory");
            MifError::OutOfRange {
                index: (ptr as usize).wrapping_sub(region.virt.as_ptr() as usize) as u32,
                limit: region.len as u32,
            }
        })?;
        Ok(MifRamRef(offset as u32))
    }

    fn mifram_ptr(&self, mref: MifRamRef) -> Option<NonNull<u8>> {
        let region = self.mapped_region()?;
        let offset = mref.0 as usize;
        if offset >= region.len {
            error!("mifram ref {offset:#x} out of range");
            return None;
        }
        NonNull::new(region.virt.as_ptr().wrapping_add(offset))
    }

    fn mifram_phys(&self, mref: MifRamRef) -> Option<u64> {
        let region = self.mapped_region()?;
        ((mref.0 as usize) < region.len).then(|| region.phys + u64::from(mref.0))
    }

    fn mifram_pfn(&self) -> Option<u64> {
        Some(self.config.mem_start >> crate::baaw::PAGE_SHIFT)
    }

    fn read_register(&self, id: RegisterId) -> MifResult<u32> {
        match id {
            RegisterId::WlbtStat => Ok(self.regs.pmu.read(self.variant.stat_reg.offset)?),
        }
    }

    fn dump_registers(&self) -> RegisterDump {
        let mut entries: alloc::vec::Vec<_> = mailbox::dump(&*self.regs.mailbox).collect();
        for (name, value) in self.pmu_regdump() {
            info!("{name} {value}");
            entries.push((name, value));
        }
        RegisterDump { entries }
    }

    fn restart(&self) {
        let _guard = self.reset_lock.lock();
        info!("restart: clearing reset failure");
        self.reset_failed.store(false, Ordering::Release);
        self.in_reset.store(false, Ordering::Release);
        self.boot_state.store(BootState::InReset);
    }

    fn reset_failure(&self) -> bool {
        self.reset_failed.load(Ordering::Acquire)
    }
}
