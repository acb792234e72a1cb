use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{Display, Formatter};
use core::ptr::NonNull;

use zerocopy::byteorder::little_endian::U32;

use crate::MifResult;
use crate::platform::Variant;

/// Handler for a transport event. Captures whatever context it needs.
pub type MifHandler = Arc<dyn Fn() + Send + Sync>;

/// Client suspend hook. An error refuses the suspend.
pub type SuspendHandler = Arc<dyn Fn() -> MifResult<()> + Send + Sync>;

pub type ResumeHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BackendKind {
    Pcie,
    Platform(Variant),
}

/// Core that a from-host interrupt is raised on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IrqTarget {
    R4,
    M4,
    M4_1,
}

/// Shared memory returned by [`MifTransport::map`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryHandle {
    virt: NonNull<u8>,
    phys: u64,
    len: usize,
}

// SAFETY: the handle only names the region; every access through it is unsafe
// and the region itself is shared with another processor anyway.
unsafe impl Send for MemoryHandle {}
// SAFETY: see above.
unsafe impl Sync for MemoryHandle {}

impl MemoryHandle {
    #[must_use]
    pub const fn new(virt: NonNull<u8>, phys: u64, len: usize) -> Self {
        Self { virt, phys, len }
    }

    #[must_use]
    pub const fn as_ptr(&self) -> NonNull<u8> {
        self.virt
    }

    #[must_use]
    pub const fn phys(&self) -> u64 {
        self.phys
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Byte offset into the shared memory region, as exchanged with firmware.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MifRamRef(pub u32);

/// A mailbox slot returned by [`MifTransport::get_mailbox_ptr`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MailboxRef {
    /// Word in the emulated mailbox block in shared memory. `ptr` is what the
    /// firmware side of the block is handed.
    Shared { index: u32, ptr: NonNull<U32> },
    /// Mailbox register reached through the transport's register map.
    Register { offset: u32 },
}

// SAFETY: as for `MemoryHandle`.
unsafe impl Send for MailboxRef {}
// SAFETY: as for `MemoryHandle`.
unsafe impl Sync for MailboxRef {}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterId {
    WlbtStat,
}

/// One register in a [`RegisterDump`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterValue {
    Read(u32),
    Unreadable,
}

impl RegisterValue {
    /// Raw value written into diagnostic records for a failed read.
    pub const UNREADABLE_SENTINEL: u32 = 0xdead_dead;

    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            RegisterValue::Read(v) => v,
            RegisterValue::Unreadable => Self::UNREADABLE_SENTINEL,
        }
    }
}

impl Display for RegisterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            RegisterValue::Read(v) => write!(f, "0x{v:08x}"),
            RegisterValue::Unreadable => write!(f, "<unreadable>"),
        }
    }
}

/// Best-effort register snapshot.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RegisterDump {
    pub entries: Vec<(&'static str, RegisterValue)>,
}

impl RegisterDump {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<RegisterValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// The contract every WLBT transport backend satisfies.
///
/// Handlers registered here may be invoked from interrupt context and must
/// not block. Until a handler is registered, and after it is unregistered, the
/// corresponding event is consumed by a silent default.
pub trait MifTransport: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn uid(&self) -> &str {
        "0"
    }

    /// `true` holds the subsystem in reset, `false` powers it on and runs the
    /// boot handshake to completion.
    fn reset(&self, assert: bool) -> MifResult<()>;

    /// Map the shared memory, put the mailbox into its all-masked, all-clear
    /// state and hook the transport's interrupts.
    ///
    /// Returns the region and the number of bytes clients may use.
    fn map(&self) -> MifResult<(MemoryHandle, usize)>;

    /// Undo [`MifTransport::map`]. Tolerates a partially failed map.
    fn unmap(&self, handle: MemoryHandle);

    fn get_mailbox_ptr(&self, index: u32) -> Option<MailboxRef>;

    fn mailbox_get(&self, mbox: MailboxRef) -> MifResult<u32>;

    fn mailbox_set(&self, mbox: MailboxRef, value: u32) -> MifResult<()>;

    /// To-host interrupt bits that are set and not masked.
    fn irq_get(&self) -> u32;

    fn irq_bit_mask_status_get(&self) -> u32;

    /// Raise from-host interrupt `bit` on `target`.
    fn irq_bit_set(&self, bit: u32, target: IrqTarget) -> MifResult<()>;

    fn irq_bit_clear(&self, bit: u32) -> MifResult<()>;

    fn irq_bit_mask(&self, bit: u32) -> MifResult<()>;

    fn irq_bit_unmask(&self, bit: u32) -> MifResult<()>;

    fn register_interrupt_handler(&self, handler: MifHandler);

    fn unregister_interrupt_handler(&self);

    fn register_reset_request_handler(&self, handler: MifHandler);

    fn unregister_reset_request_handler(&self);

    fn register_suspend_handlers(
        &self,
        _suspend: SuspendHandler,
        _resume: ResumeHandler,
    ) -> MifResult<()> {
        Err(crate::MifError::Unsupported)
    }

    fn unregister_suspend_handlers(&self) {}

    /// Ask the client to suspend. An error means the client refused.
    fn suspend(&self) -> MifResult<()> {
        Ok(())
    }

    fn resume(&self) {}

    fn mifram_ref(&self, ptr: *const u8) -> MifResult<MifRamRef>;

    fn mifram_ptr(&self, mref: MifRamRef) -> Option<NonNull<u8>>;

    fn mifram_phys(&self, mref: MifRamRef) -> Option<u64>;

    fn mifram_pfn(&self) -> Option<u64>;

    fn read_register(&self, _id: RegisterId) -> MifResult<u32> {
        Err(crate::MifError::Unsupported)
    }

    /// Never fails. Registers that cannot be read are reported as
    /// [`RegisterValue::Unreadable`].
    fn dump_registers(&self) -> RegisterDump;

    fn cleanup(&self) {}

    /// Clear a latched reset failure so the next power-on may touch hardware.
    fn restart(&self) {}

    fn reset_failure(&self) -> bool {
        false
    }
}
