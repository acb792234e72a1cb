//! Interpreter for the variant's PMU step tables

use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use log::{debug, error, info, warn};
use scsc_regmap::Regmap;
use scsc_sync::{Poll, poll_timeout};

use super::boot_state::BootState;
use super::variant::{Policy, PmuReg, PmuStep, RegSpace};
use super::PlatformMif;
use crate::irq::IrqLine;
use crate::{MifError, MifResult, RegisterValue};

impl PlatformMif {
    fn regmap(&self, space: RegSpace) -> MifResult<&dyn Regmap> {
        match space {
            RegSpace::Pmu => Ok(&*self.regs.pmu),
            RegSpace::PmicApm => self.regs.pmic_apm.as_deref().ok_or(MifError::NoDevice {
                what: "PMIC APM regmap",
            }),
        }
    }

    pub(super) fn read_pmu(&self, reg: PmuReg) -> RegisterValue {
        self.regmap(reg.space)
            .and_then(|map| map.read(reg.offset).map_err(MifError::from))
            .map_or(RegisterValue::Unreadable, RegisterValue::Read)
    }

    /// Read every register the variant lists for postmortem analysis.
    pub(super) fn pmu_regdump(&self) -> Vec<(&'static str, RegisterValue)> {
        self.variant
            .regdump
            .iter()
            .map(|reg| (reg.name, self.read_pmu(*reg)))
            .collect()
    }

    pub(super) fn log_regdump(&self) {
        for (name, value) in self.pmu_regdump() {
            error!("{name} {value}");
        }
    }

    pub(super) fn run_steps(&self, steps: &[PmuStep]) -> MifResult<()> {
        steps.iter().try_for_each(|step| self.run_step(step))
    }

    fn run_step(&self, step: &PmuStep) -> MifResult<()> {
        match *step {
            PmuStep::Update {
                reg,
                mask,
                value,
                policy,
                first_boot_only,
            } => {
                if first_boot_only && self.init_done.load(Ordering::Acquire) {
                    return Ok(());
                }
                let result = self
                    .regmap(reg.space)
                    .and_then(|map| Ok(map.update_bits(reg.offset, mask, value)?));
                if first_boot_only && result.is_ok() {
                    self.init_done.store(true, Ordering::Release);
                }
                self.settle(policy, reg, result)
            }
            PmuStep::ForceWrite {
                reg,
                mask,
                value,
                policy,
            } => {
                let result = self
                    .regmap(reg.space)
                    .and_then(|map| Ok(map.write_bits(reg.offset, mask, value)?));
                self.settle(policy, reg, result)
            }
            PmuStep::Poll {
                reg,
                mask,
                expect,
                policy,
                what,
            } => self.poll(reg, mask, expect, policy, what),
            PmuStep::Read { reg } => {
                info!("{} {}", reg.name, self.read_pmu(reg));
                Ok(())
            }
            PmuStep::Delay(d) => {
                self.host.clock.delay(d);
                Ok(())
            }
            PmuStep::CleanCfgReqPending => {
                if self.host.irq.clear_pending(IrqLine::CfgReq) {
                    debug!("dropped stale CFG_REQ");
                }
                Ok(())
            }
            PmuStep::EnableCfgReq => {
                self.host.irq.enable(IrqLine::CfgReq);
                Ok(())
            }
            PmuStep::WaitCfgReq => self.wait_cfg_req(),
        }
    }

    fn settle(&self, policy: Policy, reg: PmuReg, result: MifResult<()>) -> MifResult<()> {
        match (result, policy) {
            (Ok(()), _) => Ok(()),
            (Err(err), Policy::Advisory) => {
                warn!("failed to update {}: {err}", reg.name);
                Ok(())
            }
            (Err(err), Policy::Required) => {
                error!("failed to update {}: {err}", reg.name);
                Err(err)
            }
        }
    }

    fn poll(
        &self,
        reg: PmuReg,
        mask: u32,
        expect: u32,
        policy: Policy,
        what: &'static str,
    ) -> MifResult<()> {
        let map = match self.regmap(reg.space) {
            Ok(map) => map,
            Err(err) => return self.settle(policy, reg, Err(err)),
        };
        let polled = poll_timeout(
            &*self.host.clock,
            self.variant.timeouts.poll,
            || map.read(reg.offset),
            |value| value & mask == expect,
        );

        match polled {
            Ok(Poll::Ready(value)) => {
                debug!("{what}: {} 0x{value:08x}", reg.name);
                Ok(())
            }
            Ok(Poll::TimedOut(value)) => {
                error!("timeout waiting for {what}: {} 0x{value:08x}", reg.name);
                match policy {
                    Policy::Advisory => Ok(()),
                    Policy::Required => {
                        self.log_regdump();
                        Err(MifError::Timeout { what })
                    }
                }
            }
            Err(err) => self.settle(policy, reg, Err(err.into())),
        }
    }

    fn wait_cfg_req(&self) -> MifResult<()> {
        debug!("waiting for CFG_REQ");
        let timeout = self.variant.timeouts.cfg_req;
        if !self.cfg_ack.wait_timeout(&*self.host.clock, timeout) {
            // A late CFG_REQ must not program windows behind the caller's back.
            self.host.irq.disable(IrqLine::CfgReq);
            self.cancel_cfg_work();
            error!(
                "timeout waiting for CFG_REQ after {}ms in {:?}",
                timeout.as_millis(),
                self.boot_state.load()
            );
            self.log_regdump();
            return Err(MifError::Timeout { what: "CFG_REQ" });
        }

        match self.boot_state.load() {
            BootState::CfgDone => {
                info!("CFG_REQ handshake complete");
                Ok(())
            }
            state => {
                match self.cfg_error.lock().take() {
                    Some(cause) => error!("CFG_REQ handshake failed in {state:?}: {cause}"),
                    None => error!("CFG_REQ handshake failed in {state:?}"),
                }
                Err(MifError::ProtocolViolation)
            }
        }
    }

    /// Power the subsystem on and run the CFG_REQ handshake.
    pub(super) fn release_reset(&self) -> MifResult<()> {
        let _guard = self.reset_lock.lock();
        info!("{}: releasing WLBT from reset", self.variant.variant.name());

        self.cfg_ack.reinit();
        *self.cfg_error.lock() = None;
        self.in_reset.store(false, Ordering::Release);
        self.boot_state.store(BootState::WaitingForCfgRequest);

        self.run_steps(self.variant.power_on).inspect_err(|err| {
            error!("power on failed: {err}");
        })
    }

    /// Power the subsystem down and hold it in reset.
    pub(super) fn hold_reset(&self) -> MifResult<()> {
        let _guard = self.reset_lock.lock();
        if self.in_reset.load(Ordering::Acquire) {
            debug!("WLBT already held in reset");
            return Ok(());
        }
        info!("{}: holding WLBT in reset", self.variant.variant.name());

        self.cancel_cfg_work();
        if let Err(err) = self.run_steps(self.variant.power_down) {
            error!("power down failed: {err}");
            // Leave WLBT held in reset with power control handed back.
            if let Err(tail) = self.run_steps(self.variant.hold_fail_safe) {
                error!("failed to force WLBT into reset: {tail}");
            }
            return Err(err);
        }

        self.boot_state.store(BootState::InReset);
        self.in_reset.store(true, Ordering::Release);
        Ok(())
    }
}
