//! Interrupt bit allocator
//!
//! Service clients share the transport's interrupt bits. To-host bits carry a
//! handler and are dispatched from the transport's interrupt; from-host bits
//! are only bookkeeping, per target core. Bit [`RESERVED_PANIC_BIT`] of every
//! from-host bitmap is taken at init for forcing firmware panics.

use alloc::sync::Arc;
use core::array;

use log::{debug, error, warn};
use spin::Mutex;

use crate::{IrqTarget, MifError, MifResult, MifTransport};

/// Bits per bitmap.
pub const NUM_INT: u32 = 16;

pub const RESERVED_PANIC_BIT: u32 = 0;

/// Called with the bit number that fired. Runs in interrupt context.
pub type IntrBitHandler = Arc<dyn Fn(u32) + Send + Sync>;

/// Snapshot of the allocation bitmaps, bit n set when bit n is taken.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct IntrBitmaps {
    pub tohost: u16,
    pub fromhost_r4: u16,
    pub fromhost_m4: u16,
}

impl IntrBitmaps {
    fn fromhost_mut(&mut self, target: IrqTarget) -> MifResult<&mut u16> {
        match target {
            IrqTarget::R4 => Ok(&mut self.fromhost_r4),
            IrqTarget::M4 => Ok(&mut self.fromhost_m4),
            IrqTarget::M4_1 => Err(MifError::Unsupported),
        }
    }
}

fn first_free(bitmap: u16) -> Option<u32> {
    let bit = bitmap.trailing_ones();
    (bit < NUM_INT).then_some(bit)
}

fn check_bit(bit: u32) -> MifResult<()> {
    if bit >= NUM_INT {
        return Err(MifError::OutOfRange {
            index: bit,
            limit: NUM_INT,
        });
    }
    Ok(())
}

struct State {
    bitmaps: IntrBitmaps,
    /// `None` is the default handler: clear the bit and move on.
    handlers: [Option<IntrBitHandler>; NUM_INT as usize],
}

pub struct MifIntrBit {
    mif: Arc<dyn MifTransport>,
    state: Mutex<State>,
}

impl MifIntrBit {
    /// Reserve the panic bits and hook the dispatcher as `mif`'s interrupt
    /// handler.
    pub fn init(mif: Arc<dyn MifTransport>) -> Arc<Self> {
        let bitmaps = IntrBitmaps {
            tohost: 0,
            fromhost_r4: 1 << RESERVED_PANIC_BIT,
            fromhost_m4: 1 << RESERVED_PANIC_BIT,
        };
        let intr = Arc::new(Self {
            mif,
            state: Mutex::new(State {
                bitmaps,
                handlers: array::from_fn(|_| None),
            }),
        });

        let weak = Arc::downgrade(&intr);
        intr.mif.register_interrupt_handler(Arc::new(move || {
            if let Some(intr) = weak.upgrade() {
                intr.dispatch();
            }
        }));
        intr
    }

    /// Drop every handler, then detach from the transport.
    pub fn deinit(&self) {
        let mut state = self.state.lock();
        state.handlers.iter_mut().for_each(|slot| *slot = None);
        self.mif.unregister_interrupt_handler();
    }

    #[must_use]
    pub fn bitmaps(&self) -> IntrBitmaps {
        let bitmaps = self.state.lock().bitmaps;
        debug!(
            "tohost {:#06x} fromhost_r4 {:#06x} fromhost_m4 {:#06x}",
            bitmaps.tohost, bitmaps.fromhost_r4, bitmaps.fromhost_m4
        );
        bitmaps
    }

    /// Take the lowest free to-host bit and route it to `handler`.
    pub fn alloc_tohost(&self, handler: IntrBitHandler) -> MifResult<u32> {
        let bit = {
            let mut state = self.state.lock();
            let Some(bit) = first_free(state.bitmaps.tohost) else {
                error!("no free to-host interrupt bit");
                return Err(MifError::Exhausted);
            };

            // A stale interrupt must not reach the new handler.
            self.mif.irq_bit_mask(bit)?;
            self.mif.irq_bit_clear(bit)?;
            state.handlers[bit as usize] = Some(handler);
            state.bitmaps.tohost |= 1 << bit;
            bit
        };

        // Unmasking a pending source can deliver it synchronously, so the
        // dispatcher must be able to take the lock.
        if let Err(err) = self.mif.irq_bit_unmask(bit) {
            error!("failed to unmask to-host bit {bit}: {err}");
            let mut state = self.state.lock();
            state.handlers[bit as usize] = None;
            state.bitmaps.tohost &= !(1 << bit);
            return Err(err);
        }
        debug!("to-host bit {bit} allocated");
        Ok(bit)
    }

    pub fn free_tohost(&self, bit: u32) -> MifResult<()> {
        check_bit(bit).inspect_err(|_| error!("cannot free to-host bit {bit}"))?;

        let mut state = self.state.lock();
        if state.bitmaps.tohost & (1 << bit) == 0 {
            warn!("freeing unallocated to-host bit {bit}");
        }
        self.mif.irq_bit_mask(bit)?;
        state.handlers[bit as usize] = None;
        self.mif.irq_bit_clear(bit)?;
        state.bitmaps.tohost &= !(1 << bit);
        debug!("to-host bit {bit} freed");
        Ok(())
    }

    /// Take the lowest free bit towards `target`.
    pub fn alloc_fromhost(&self, target: IrqTarget) -> MifResult<u32> {
        let mut state = self.state.lock();
        let bitmap = state
            .bitmaps
            .fromhost_mut(target)
            .inspect_err(|_| error!("no from-host bitmap for {target:?}"))?;
        let Some(bit) = first_free(*bitmap) else {
            error!("no free from-host interrupt bit on {target:?}");
            return Err(MifError::Exhausted);
        };
        *bitmap |= 1 << bit;
        debug!("from-host bit {bit} allocated on {target:?}");
        Ok(bit)
    }

    pub fn free_fromhost(&self, bit: u32, target: IrqTarget) -> MifResult<()> {
        check_bit(bit).inspect_err(|_| error!("cannot free bit {bit} on {target:?}"))?;

        let mut state = self.state.lock();
        let bitmap = state.bitmaps.fromhost_mut(target)?;
        if bit == RESERVED_PANIC_BIT {
            warn!("bit {bit} on {target:?} is reserved for panics, not freed");
            return Ok(());
        }
        *bitmap &= !(1 << bit);
        debug!("from-host bit {bit} freed on {target:?}");
        Ok(())
    }

    /// Read the pending word once and run the handler of every set bit.
    fn dispatch(&self) {
        let pending = self.mif.irq_get();
        let handlers: [Option<IntrBitHandler>; NUM_INT as usize] =
            self.state.lock().handlers.clone();

        for bit in (0..NUM_INT).filter(|bit| pending & (1 << bit) != 0) {
            match &handlers[bit as usize] {
                Some(handler) => handler(bit),
                None => {
                    if let Err(err) = self.mif.irq_bit_clear(bit) {
                        error!("failed to clear to-host bit {bit}: {err}");
                    }
                }
            }
        }
    }
}
