//! CFG_REQ handling
//!
//! Once powered, the subsystem raises CFG_REQ and stalls until the AP has
//! programmed its address windows, loaded the boot ROM patch and written
//! CFG_ACK.

use core::sync::atomic::Ordering;

use log::{debug, error, info};

use super::boot_state::BootState;
use super::variant::{ChipVersionId, ChipVersionRule};
use super::PlatformMif;
use crate::baaw::{self, PAGE_SHIFT};
use crate::irq::IrqLine;
use crate::work::{CfgReqStrategy, CfgWork};
use crate::{MifError, MifResult};

mod boot_cfg {
    /// 1 while the AP owns the boot RAM.
    pub const RAM_OWNER: u32 = 0x0;
    pub const CFG_ACK: u32 = 0x4;
}

impl PlatformMif {
    /// CFG_REQ interrupt handler.
    pub(super) fn cfg_req_isr(&self) {
        // Not re-armed until the next power-on.
        self.host.irq.disable(IrqLine::CfgReq);

        let state = self.boot_state.load();
        if state != BootState::WaitingForCfgRequest {
            error!("spurious CFG_REQ in {state:?}, latching reset failure");
            self.log_regdump();
            self.reset_failed.store(true, Ordering::Release);
            *self.cfg_error.lock() = Some(MifError::ProtocolViolation);
            self.boot_state.store(BootState::CfgError);
            self.cfg_ack.complete();
            return;
        }

        match &self.config.cfg_req {
            CfgReqStrategy::Direct => self.complete_cfg_req(),
            CfgReqStrategy::Deferred(scheduler) => {
                debug!("deferring CFG_REQ programming");
                self.cfg_work_pending.store(true, Ordering::Release);
                scheduler.schedule(CfgWork(self.me.clone()));
            }
        }
    }

    pub(crate) fn run_deferred_cfg_work(&self) {
        if !self.cfg_work_pending.swap(false, Ordering::AcqRel) {
            debug!("CFG_REQ work no longer pending");
            return;
        }
        let state = self.boot_state.load();
        if state != BootState::WaitingForCfgRequest {
            debug!("dropping CFG_REQ work in {state:?}");
            return;
        }
        self.complete_cfg_req();
    }

    pub(super) fn cancel_cfg_work(&self) {
        if !self.cfg_work_pending.swap(false, Ordering::AcqRel) {
            return;
        }
        if let CfgReqStrategy::Deferred(scheduler) = &self.config.cfg_req {
            scheduler.cancel();
        }
        info!("cancelled pending CFG_REQ work");
    }

    fn complete_cfg_req(&self) {
        match self.program_wlbt() {
            Ok(()) => {
                self.boot_state.store(BootState::CfgDone);
                info!("CFG_REQ acknowledged");
            }
            Err(err) => {
                error!("CFG_REQ programming failed: {err}");
                *self.cfg_error.lock() = Some(err);
                self.boot_state.store(BootState::CfgError);
            }
        }
        self.cfg_ack.complete();
    }

    fn program_wlbt(&self) -> MifResult<()> {
        self.run_steps(self.variant.pre_cfg)?;

        let remap = &*self.regs.remap;
        remap.write(
            self.variant.remap_offset,
            self.variant.dram_window.start >> PAGE_SHIFT,
        )?;
        self.update_chip_version()?;

        let dram = self.variant.dram_window_for(self.config.mem_start);
        baaw::program(&*self.regs.dbus_baaw, 0, &dram)?;
        baaw::program_all(&*self.regs.pbus_baaw, self.variant.peripheral_windows)?;

        self.load_boot_patch()?;

        // The firmware may run (and panic) as soon as it sees the ack.
        self.boot_state.store(BootState::AckingCfgRequest);
        self.regs.boot_cfg.write(boot_cfg::CFG_ACK, 1)?;
        debug!("CFG_ACK written");

        self.run_steps(self.variant.post_ack)
    }

    fn update_chip_version(&self) -> MifResult<()> {
        let remap = &*self.regs.remap;
        let (offset, id) = match self.variant.chip_version {
            ChipVersionRule::None => return Ok(()),
            ChipVersionRule::SocRevision { offset } => {
                let mut id = ChipVersionId::from_raw(remap.read(offset)?);
                id.set_ip_revision(self.config.soc_revision & 0xff);
                (offset, id)
            }
            ChipVersionRule::Ema { offset, value } => {
                let mut id = ChipVersionId::from_raw(remap.read(offset)?);
                id.set_ema(value);
                (offset, id)
            }
        };
        remap.write(offset, id.raw())?;
        debug!("CHIP_VERSION_ID 0x{:08x}", id.raw());
        Ok(())
    }

    fn load_boot_patch(&self) -> MifResult<()> {
        let ram = &*self.regs.boot_cfg;
        ram.write(boot_cfg::RAM_OWNER, 1)?;
        for (word, addr) in self
            .variant
            .boot_patch
            .iter()
            .zip((self.variant.patch_base..).step_by(4))
        {
            ram.write(addr, *word)?;
        }
        ram.write(boot_cfg::RAM_OWNER, 0)?;
        debug!("{} boot patch words loaded", self.variant.boot_patch.len());
        Ok(())
    }
}
