use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use log::{debug, error, info, warn};

use super::boot_state::BootState;
use super::{PlatformMif, mailbox};
use crate::irq::{IrqHandler, IrqLine};
use crate::MifResult;

impl PlatformMif {
    fn handler_for(&self, isr: fn(&PlatformMif)) -> IrqHandler {
        let me = self.me.clone();
        Arc::new(move || {
            if let Some(mif) = me.upgrade() {
                isr(&mif);
            }
        })
    }

    fn mbox_isr(&self) {
        if self.mif_handler.invoke() {
            return;
        }
        let map = &*self.regs.mailbox;
        match mailbox::pending(map) {
            Ok(0) => {}
            Ok(pending) => {
                debug!("no MIF handler, clearing 0x{pending:04x}");
                for bit in (0..mailbox::MAILBOX_BITS).filter(|bit| pending & (1 << bit) != 0) {
                    if let Err(err) = mailbox::clear(map, bit) {
                        error!("failed to clear mailbox bit {bit}: {err}");
                    }
                }
            }
            Err(err) => error!("failed to read pending mailbox bits: {err}"),
        }
    }

    fn wdog_isr(&self) {
        match self.reset_request_handler.get() {
            Some(_) if self.boot_state.load() == BootState::WaitingForCfgRequest => {
                warn!("reset request while waiting for CFG_REQ, ignored");
            }
            Some(handler) => {
                self.host.irq.disable(IrqLine::Wdog);
                info!("reset request from WLBT");
                handler();
            }
            None => {
                self.host.irq.disable(IrqLine::Wdog);
                let count = self.wdog_disabled.fetch_add(1, Ordering::AcqRel) + 1;
                warn!("reset request with no handler, WDOG disabled ({count})");
            }
        }

        if let Some((reg, bit)) = self.variant.wakeup_int_type {
            if let Err(err) = self.regs.pmu.update_bits(reg.offset, bit, 0) {
                error!("failed to clear {}: {err}", reg.name);
            }
        }
    }

    fn alive_isr(&self) {
        debug!("WLBT alive");
    }

    pub(super) fn request_irqs(&self) -> MifResult<()> {
        let irq = &*self.host.irq;

        irq.request(IrqLine::Mbox, self.handler_for(PlatformMif::mbox_isr))?;
        if let Err(err) = irq.request(IrqLine::Wdog, self.handler_for(PlatformMif::wdog_isr)) {
            irq.free(IrqLine::Mbox);
            return Err(err);
        }
        if self.config.alive_irq {
            if let Err(err) = irq.request(IrqLine::Alive, self.handler_for(PlatformMif::alive_isr))
            {
                irq.free(IrqLine::Wdog);
                irq.free(IrqLine::Mbox);
                return Err(err);
            }
        }

        self.boot_state.store(BootState::InReset);
        irq.clear_pending(IrqLine::CfgReq);
        if let Err(err) = irq.request(IrqLine::CfgReq, self.handler_for(PlatformMif::cfg_req_isr))
        {
            self.free_irqs();
            return Err(err);
        }
        // Armed by the power-on sequence.
        irq.disable(IrqLine::CfgReq);
        Ok(())
    }

    pub(super) fn free_irqs(&self) {
        let irq = &*self.host.irq;
        irq.free(IrqLine::Mbox);
        irq.free(IrqLine::Wdog);
        self.wdog_disabled.store(0, Ordering::Release);
        if self.config.alive_irq {
            irq.free(IrqLine::Alive);
        }
        irq.free(IrqLine::CfgReq);
    }
}
