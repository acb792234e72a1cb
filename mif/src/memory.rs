//! Shared memory provider
//!
//! The platform transport maps a fixed carve-out at a known physical address;
//! the PCIe transport allocates DMA-able memory and tells the device where it
//! landed. Both go through [`SharedMemory`] so they can be backed by the heap
//! in tests and in the simulator.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use core::ptr::NonNull;

use log::{debug, warn};
use spin::Mutex;

use crate::{MifError, MifResult};

/// A mapped shared memory region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Region {
    pub virt: NonNull<u8>,
    pub phys: u64,
    pub len: usize,
}

// SAFETY: the region is plain memory shared with another processor; the
// struct itself only names it.
unsafe impl Send for Region {}
// SAFETY: see above.
unsafe impl Sync for Region {}

impl Region {
    /// `true` if `ptr` points inside the region.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.virt.as_ptr() as usize;
        let p = ptr as usize;
        p >= start && p - start < self.len
    }

    /// Byte offset of `ptr` from the start of the region.
    #[must_use]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        self.contains(ptr)
            .then(|| ptr as usize - self.virt.as_ptr() as usize)
    }
}

pub trait SharedMemory: Send + Sync {
    /// Map `len` bytes. `phys` names a fixed carve-out; `None` asks for a
    /// fresh DMA-able allocation.
    fn acquire(&self, phys: Option<u64>, len: usize) -> MifResult<Region>;

    fn release(&self, region: Region);
}

/// Heap-backed [`SharedMemory`].
///
/// Fixed requests get their physical address echoed back; DMA requests are
/// handed addresses counting up from `dma_base`.
pub struct HeapMemory {
    dma_base: u64,
    next_dma: Mutex<u64>,
    buffers: Mutex<BTreeMap<usize, Box<[u8]>>>,
}

impl HeapMemory {
    #[must_use]
    pub const fn new(dma_base: u64) -> Self {
        Self {
            dma_base,
            next_dma: Mutex::new(dma_base),
            buffers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of regions currently handed out.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// DMA addresses start below 4 GiB, where a 32-bit endpoint can reach them.
impl Default for HeapMemory {
    fn default() -> Self {
        Self::new(0x4000_0000)
    }
}

impl SharedMemory for HeapMemory {
    fn acquire(&self, phys: Option<u64>, len: usize) -> MifResult<Region> {
        if len == 0 {
            return Err(MifError::MappingFailed);
        }
        let mut buffer = vec![0u8; len].into_boxed_slice();
        let virt = NonNull::from(&mut buffer[..]).cast::<u8>();

        let phys = match phys {
            Some(phys) => phys,
            None => {
                let mut next = self.next_dma.lock();
                let phys = *next;
                *next = next.saturating_add((len as u64).next_multiple_of(0x1000));
                phys
            }
        };

        self.buffers.lock().insert(virt.as_ptr() as usize, buffer);
        debug!("mapped {len:#x} bytes at {phys:#x} (dma base {:#x})", self.dma_base);
        Ok(Region { virt, phys, len })
    }

    fn release(&self, region: Region) {
        if self
            .buffers
            .lock()
            .remove(&(region.virt.as_ptr() as usize))
            .is_none()
        {
            warn!("release of unknown region at {:#x}", region.phys);
        }
    }
}
