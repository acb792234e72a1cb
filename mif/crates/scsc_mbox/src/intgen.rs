//! Interrupt generator emulation over the shared mailbox block

use alloc::sync::Arc;
use core::ptr::NonNull;
use core::sync::atomic::{Ordering, fence};

use log::{debug, error};
use volatile::VolatilePtr;
use zerocopy::byteorder::little_endian::U32;

use crate::layout::{
    INTGEN_COUNT, MAILBOX_COUNT, MBOX_MAGIC, MBOX_VERSION, MailboxBlock, SOURCE_COUNT,
};
use crate::{MboxError, MboxResult};

/// Interrupt generators in the block, in layout order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(usize)]
pub enum IntgenId {
    /// Interrupts raised towards the host.
    Ap = 0,
    R4 = 1,
    M4 = 2,
    M4_1 = 3,
}

impl IntgenId {
    pub const ALL: [IntgenId; INTGEN_COUNT] =
        [IntgenId::Ap, IntgenId::R4, IntgenId::M4, IntgenId::M4_1];
}

/// Delivers a generator's interrupt to its target core.
pub type Trigger = Arc<dyn Fn() + Send + Sync>;

/// Mask and status of one interrupt source.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SourceState {
    pub masked: bool,
    pub set: bool,
}

impl SourceState {
    /// Set and not masked.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        self.set && !self.masked
    }
}

/// Mailbox block living in shared memory.
///
/// Writes are followed by a release fence before any trigger runs, so the
/// receiving side never sees the interrupt before the state behind it.
pub struct PcieMbox {
    base: NonNull<MailboxBlock>,
    triggers: [Trigger; INTGEN_COUNT],
}

// SAFETY: the block is plain shared memory accessed only through volatile
// word accesses; the remote firmware accesses it concurrently anyway.
unsafe impl Send for PcieMbox {}
// SAFETY: see above.
unsafe impl Sync for PcieMbox {}

impl PcieMbox {
    /// Initialise the block at `region`: clear every mailbox, mask and clear
    /// every source, then write magic and version.
    ///
    /// `triggers` are indexed by [`IntgenId`].
    ///
    /// # Safety
    ///
    /// `region` must be valid for reads and writes of `len` bytes for as long
    /// as the returned mailbox (or any pointer obtained from it) is used.
    pub unsafe fn init(
        region: NonNull<u8>,
        len: usize,
        triggers: [Trigger; INTGEN_COUNT],
    ) -> MboxResult<Self> {
        let needed = size_of::<MailboxBlock>();
        if len < needed {
            return Err(MboxError::RegionTooSmall {
                needed,
                available: len,
            });
        }

        let mbox = Self {
            base: region.cast(),
            triggers,
        };

        for index in 0..MAILBOX_COUNT {
            mbox.mailbox_word(index).write(U32::new(0));
        }
        for id in IntgenId::ALL {
            for n in 0..SOURCE_COUNT {
                mbox.mask_word(id, n).write(U32::new(1));
                mbox.status_word(id, n).write(U32::new(0));
            }
        }
        mbox.magic_word().write(U32::new(MBOX_MAGIC));
        mbox.version_word().write(U32::new(MBOX_VERSION));
        fence(Ordering::Release);

        debug!("mailbox block initialised at {:p}", region);
        Ok(mbox)
    }

    #[must_use]
    pub fn magic(&self) -> u32 {
        self.magic_word().read().get()
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version_word().read().get()
    }

    /// Pointer to mailbox slot `index`.
    pub fn mailbox_slot(&self, index: u32) -> MboxResult<NonNull<U32>> {
        let i = index as usize;
        if i >= MAILBOX_COUNT {
            error!("mailbox {} out of range", index);
            return Err(MboxError::MailboxOutOfRange(index));
        }
        Ok(self.mailbox_ptr(i))
    }

    pub fn read_mailbox(&self, index: u32) -> MboxResult<u32> {
        self.mailbox_slot(index)?;
        Ok(self.mailbox_word(index as usize).read().get())
    }

    pub fn write_mailbox(&self, index: u32, value: u32) -> MboxResult<()> {
        self.mailbox_slot(index)?;
        self.mailbox_word(index as usize).write(U32::new(value));
        fence(Ordering::Release);
        Ok(())
    }

    /// Raise source `n`; fires the trigger if the source is unmasked.
    pub fn set_source(&self, id: IntgenId, n: u32) -> MboxResult<()> {
        let n = Self::check_source(n)?;
        self.status_word(id, n).write(U32::new(1));
        fence(Ordering::Release);
        if self.mask_word(id, n).read().get() == 0 {
            (self.triggers[id as usize])();
        }
        Ok(())
    }

    /// Lower source `n`. Never triggers.
    pub fn clear_source(&self, id: IntgenId, n: u32) -> MboxResult<()> {
        let n = Self::check_source(n)?;
        self.status_word(id, n).write(U32::new(0));
        fence(Ordering::Release);
        Ok(())
    }

    /// Mask source `n`. Never triggers.
    pub fn mask_source(&self, id: IntgenId, n: u32) -> MboxResult<()> {
        let n = Self::check_source(n)?;
        self.mask_word(id, n).write(U32::new(1));
        fence(Ordering::Release);
        Ok(())
    }

    /// Unmask source `n`; a source that is already raised fires immediately.
    pub fn unmask_source(&self, id: IntgenId, n: u32) -> MboxResult<()> {
        let n = Self::check_source(n)?;
        self.mask_word(id, n).write(U32::new(0));
        fence(Ordering::Release);
        if self.status_word(id, n).read().get() != 0 {
            (self.triggers[id as usize])();
        }
        Ok(())
    }

    pub fn source_state(&self, id: IntgenId, n: u32) -> MboxResult<SourceState> {
        let n = Self::check_source(n)?;
        Ok(SourceState {
            masked: self.mask_word(id, n).read().get() != 0,
            set: self.status_word(id, n).read().get() != 0,
        })
    }

    /// `false` for out-of-range sources.
    #[must_use]
    pub fn is_source_pending(&self, id: IntgenId, n: u32) -> bool {
        self.source_state(id, n)
            .map(SourceState::is_pending)
            .unwrap_or(false)
    }

    /// Bit n set iff source n is raised and unmasked.
    #[must_use]
    pub fn pending_bitmask(&self, id: IntgenId) -> u32 {
        (0..SOURCE_COUNT).fold(0, |acc, n| {
            let state = SourceState {
                masked: self.mask_word(id, n).read().get() != 0,
                set: self.status_word(id, n).read().get() != 0,
            };
            if state.is_pending() { acc | (1 << n) } else { acc }
        })
    }

    /// Bit n set iff source n is masked.
    #[must_use]
    pub fn masked_bitmask(&self, id: IntgenId) -> u32 {
        (0..SOURCE_COUNT).fold(0, |acc, n| {
            if self.mask_word(id, n).read().get() != 0 {
                acc | (1 << n)
            } else {
                acc
            }
        })
    }

    fn check_source(n: u32) -> MboxResult<usize> {
        let index = n as usize;
        if index >= SOURCE_COUNT {
            error!("interrupt source {} out of range", n);
            return Err(MboxError::SourceOutOfRange(n));
        }
        Ok(index)
    }

    fn magic_word(&self) -> VolatilePtr<'_, U32> {
        let block = self.base.as_ptr();
        // SAFETY: the header lies inside the block validated in `init`.
        unsafe { VolatilePtr::new(NonNull::new_unchecked(&raw mut (*block).magic)) }
    }

    fn version_word(&self) -> VolatilePtr<'_, U32> {
        let block = self.base.as_ptr();
        // SAFETY: as for `magic_word`.
        unsafe { VolatilePtr::new(NonNull::new_unchecked(&raw mut (*block).version)) }
    }

    fn mailbox_ptr(&self, index: usize) -> NonNull<U32> {
        let block = self.base.as_ptr();
        // SAFETY: index < MAILBOX_COUNT; the projection creates no reference.
        unsafe { NonNull::new_unchecked(&raw mut (*block).mailbox[index]) }
    }

    fn mailbox_word(&self, index: usize) -> VolatilePtr<'_, U32> {
        // SAFETY: the slot lies inside the block validated in `init`.
        unsafe { VolatilePtr::new(self.mailbox_ptr(index)) }
    }

    fn mask_word(&self, id: IntgenId, n: usize) -> VolatilePtr<'_, U32> {
        let block = self.base.as_ptr();
        // SAFETY: n < SOURCE_COUNT and id indexes one of INTGEN_COUNT generators.
        unsafe {
            VolatilePtr::new(NonNull::new_unchecked(
                &raw mut (*block).intgen[id as usize].mask[n],
            ))
        }
    }

    fn status_word(&self, id: IntgenId, n: usize) -> VolatilePtr<'_, U32> {
        let block = self.base.as_ptr();
        // SAFETY: as for `mask_word`.
        unsafe {
            VolatilePtr::new(NonNull::new_unchecked(
                &raw mut (*block).intgen[id as usize].status[n],
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;
    use core::sync::atomic::AtomicU32;

    use super::*;
    use crate::MBOX_RESERVED_LEN;

    struct Fixture {
        _memory: Vec<u8>,
        mbox: PcieMbox,
        fired: [Arc<AtomicU32>; INTGEN_COUNT],
    }

    fn fixture() -> Fixture {
        let mut memory = vec![0xAAu8; MBOX_RESERVED_LEN];
        let fired: [Arc<AtomicU32>; INTGEN_COUNT] =
            core::array::from_fn(|_| Arc::new(AtomicU32::new(0)));
        let triggers: [Trigger; INTGEN_COUNT] = core::array::from_fn(|i| {
            let counter = fired[i].clone();
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }) as Trigger
        });
        let region = NonNull::new(memory.as_mut_ptr()).unwrap();
        // SAFETY: `memory` lives in the fixture next to the mailbox.
        let mbox = unsafe { PcieMbox::init(region, memory.len(), triggers) }.unwrap();
        Fixture {
            _memory: memory,
            mbox,
            fired,
        }
    }

    #[test]
    fn test_init_writes_header_and_masks_everything() {
        let f = fixture();

        assert_eq!(f.mbox.magic(), MBOX_MAGIC);
        assert_eq!(f.mbox.version(), MBOX_VERSION);
        for id in IntgenId::ALL {
            assert_eq!(f.mbox.masked_bitmask(id), u32::MAX);
            assert_eq!(f.mbox.pending_bitmask(id), 0);
        }
        assert_eq!(f.mbox.read_mailbox(31).unwrap(), 0);
    }

    #[test]
    fn test_set_on_masked_source_does_not_trigger() {
        let f = fixture();

        f.mbox.set_source(IntgenId::R4, 4).unwrap();

        assert_eq!(f.fired[IntgenId::R4 as usize].load(Ordering::SeqCst), 0);
        assert_eq!(
            f.mbox.source_state(IntgenId::R4, 4).unwrap(),
            SourceState {
                masked: true,
                set: true
            }
        );
        assert_eq!(f.mbox.pending_bitmask(IntgenId::R4), 0);
    }

    #[test]
    fn test_unmask_of_raised_source_triggers_once() {
        let f = fixture();
        f.mbox.set_source(IntgenId::Ap, 7).unwrap();

        f.mbox.unmask_source(IntgenId::Ap, 7).unwrap();

        assert_eq!(f.fired[IntgenId::Ap as usize].load(Ordering::SeqCst), 1);
        assert_eq!(f.mbox.pending_bitmask(IntgenId::Ap), 1 << 7);
    }

    #[test]
    fn test_clear_and_mask_never_trigger() {
        let f = fixture();
        f.mbox.unmask_source(IntgenId::M4, 1).unwrap();
        f.mbox.set_source(IntgenId::M4, 1).unwrap();
        assert_eq!(f.fired[IntgenId::M4 as usize].load(Ordering::SeqCst), 1);

        f.mbox.mask_source(IntgenId::M4, 1).unwrap();
        f.mbox.clear_source(IntgenId::M4, 1).unwrap();

        assert_eq!(f.fired[IntgenId::M4 as usize].load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_range_is_a_no_op() {
        let f = fixture();

        assert_eq!(
            f.mbox.set_source(IntgenId::Ap, 32),
            Err(MboxError::SourceOutOfRange(32))
        );
        assert_eq!(
            f.mbox.write_mailbox(32, 1),
            Err(MboxError::MailboxOutOfRange(32))
        );
        assert!(!f.mbox.is_source_pending(IntgenId::Ap, 40));
        assert!(f.fired.iter().all(|c| c.load(Ordering::SeqCst) == 0));
    }

    #[test]
    fn test_region_too_small() {
        let mut memory = vec![0u8; 64];
        let triggers: [Trigger; INTGEN_COUNT] = core::array::from_fn(|_| Arc::new(|| {}) as Trigger);
        let region = NonNull::new(memory.as_mut_ptr()).unwrap();

        // SAFETY: init rejects the region before touching it.
        let result = unsafe { PcieMbox::init(region, memory.len(), triggers) };
        assert!(matches!(
            result,
            Err(MboxError::RegionTooSmall {
                available: 64,
                ..
            })
        ));
    }
}
