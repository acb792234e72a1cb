//! Interrupt Generator Semantics
//!
//! Pending means set and not masked, masking and clearing never deliver, and
//! unmasking a raised source delivers exactly once. The block is checked
//! through raw bytes as well, since the firmware reads the same memory.

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use scsc_mbox::{
    INTGEN_COUNT, IntgenId, MBOX_MAGIC, MBOX_RESERVED_LEN, MailboxBlock, PcieMbox, SOURCE_COUNT,
    Trigger,
};

struct Harness {
    memory: Vec<u8>,
    mbox: PcieMbox,
    fired: Arc<[AtomicU32; INTGEN_COUNT]>,
}

impl Harness {
    fn new() -> Self {
        let mut memory = vec![0u8; MBOX_RESERVED_LEN];
        let fired: Arc<[AtomicU32; INTGEN_COUNT]> =
            Arc::new(core::array::from_fn(|_| AtomicU32::new(0)));
        let triggers: [Trigger; INTGEN_COUNT] = core::array::from_fn(|i| {
            let fired = fired.clone();
            Arc::new(move || {
                fired[i].fetch_add(1, Ordering::SeqCst);
            }) as Trigger
        });
        let region = NonNull::new(memory.as_mut_ptr()).expect("buffer");
        // SAFETY: the buffer is owned by the harness and never reallocated.
        let mbox = unsafe { PcieMbox::init(region, memory.len(), triggers) }
            .expect("failed to init mailbox");
        Self {
            memory,
            mbox,
            fired,
        }
    }

    fn fired(&self, id: IntgenId) -> u32 {
        self.fired[id as usize].load(Ordering::SeqCst)
    }

    fn word(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.memory[offset..offset + 4].try_into().expect("word"))
    }
}

#[test]
fn pending_is_set_and_not_masked_for_every_source() {
    let h = Harness::new();
    let id = IntgenId::M4;

    // source n: set when n % 2 == 0, unmasked when n % 3 == 0
    for n in 0..SOURCE_COUNT as u32 {
        if n % 3 == 0 {
            h.mbox.unmask_source(id, n).expect("unmask");
        }
        if n % 2 == 0 {
            h.mbox.set_source(id, n).expect("set");
        }
    }

    let pending = h.mbox.pending_bitmask(id);
    for n in 0..SOURCE_COUNT as u32 {
        let expected = n % 2 == 0 && n % 3 == 0;
        assert_eq!(pending & (1 << n) != 0, expected, "source {n}");
        assert_eq!(h.mbox.is_source_pending(id, n), expected, "source {n}");
    }
    // one delivery per set-while-unmasked
    assert_eq!(h.fired(id), 6);
    assert_eq!(h.fired(IntgenId::Ap), 0);
}

#[test]
fn masked_set_then_unmask_delivers_exactly_once() {
    let h = Harness::new();

    h.mbox.set_source(IntgenId::R4, 9).expect("set");
    assert_eq!(h.fired(IntgenId::R4), 0);

    h.mbox.unmask_source(IntgenId::R4, 9).expect("unmask");
    assert_eq!(h.fired(IntgenId::R4), 1);

    h.mbox.mask_source(IntgenId::R4, 9).expect("mask");
    h.mbox.clear_source(IntgenId::R4, 9).expect("clear");
    h.mbox.unmask_source(IntgenId::R4, 9).expect("unmask");
    assert_eq!(h.fired(IntgenId::R4), 1);
}

#[test]
fn state_is_visible_in_the_wire_layout() {
    let h = Harness::new();
    h.mbox.write_mailbox(5, 0x1234_5678).expect("write");
    h.mbox.unmask_source(IntgenId::M4_1, 2).expect("unmask");
    h.mbox.set_source(IntgenId::M4_1, 2).expect("set");

    let intgen = 0x88 + 3 * 0x100;
    assert_eq!(h.word(5 * 4), 0x1234_5678);
    assert_eq!(h.word(0x80), MBOX_MAGIC);
    assert_eq!(h.word(intgen + 2 * 4), 0, "mask word");
    assert_eq!(h.word(intgen + 0x80 + 2 * 4), 1, "status word");
    assert_eq!(h.word(intgen + 4), 1, "neighbour stays masked");
    assert!(size_of::<MailboxBlock>() <= h.memory.len());
}
