//! Memory-mapped register window

use core::ptr::NonNull;

use volatile::VolatilePtr;

use crate::{Regmap, RegmapError, RegmapResult};

/// A [`Regmap`] over a mapped register window.
///
/// All accesses are volatile, 32 bits wide and must be 4-byte aligned.
pub struct MmioRegmap {
    name: &'static str,
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is device memory; concurrent volatile accesses are what
// the hardware expects and higher layers serialise read-modify-write sequences.
unsafe impl Send for MmioRegmap {}
// SAFETY: see above.
unsafe impl Sync for MmioRegmap {}

impl MmioRegmap {
    /// Create a regmap over `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// Caller must ensure:
    /// - `base` is 4-byte aligned and mapped for `len` bytes for the lifetime of the regmap
    /// - the window is device (or otherwise volatile-safe) memory
    #[must_use]
    pub const unsafe fn new(name: &'static str, base: NonNull<u8>, len: usize) -> Self {
        Self {
            name,
            base: base.cast(),
            len,
        }
    }

    /// Size of the window in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn reg(&self, offset: u32) -> RegmapResult<VolatilePtr<'_, u32>> {
        let off = offset as usize;
        if off % 4 != 0 || off.checked_add(4).is_none_or(|end| end > self.len) {
            return Err(RegmapError::OutOfBounds {
                offset,
                len: self.len,
            });
        }
        // SAFETY: offset is aligned and inside the window validated at construction.
        let ptr = unsafe { self.base.add(off / 4) };
        // SAFETY: ptr points to a live, aligned register inside the window.
        Ok(unsafe { VolatilePtr::new(ptr) })
    }
}

impl Regmap for MmioRegmap {
    fn name(&self) -> &str {
        self.name
    }

    fn read(&self, offset: u32) -> RegmapResult<u32> {
        Ok(self.reg(offset)?.read())
    }

    fn write(&self, offset: u32, value: u32) -> RegmapResult<()> {
        self.reg(offset)?.write(value);
        Ok(())
    }
}
