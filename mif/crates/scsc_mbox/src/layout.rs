//! Wire layout of the shared mailbox block

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Mailbox slots shared with the firmware.
pub const MAILBOX_COUNT: usize = 32;
/// Interrupt sources per generator.
pub const SOURCE_COUNT: usize = 32;
/// Generators: AP, R4, M4 and M4_1.
pub const INTGEN_COUNT: usize = 4;

/// "MBOX", written once when the block is initialised.
pub const MBOX_MAGIC: u32 = 0x4d42_4f58;
/// Layout version, major in the high half.
pub const MBOX_VERSION: u32 = 0x0001_0000;

/// Bytes reserved for the block at the end of the shared region.
pub const MBOX_RESERVED_LEN: usize = 0x1000;

/// One interrupt generator.
#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IntgenBlock {
    /// Non-zero masks the source.
    pub mask: [U32; SOURCE_COUNT],
    /// Non-zero marks the source as raised.
    pub status: [U32; SOURCE_COUNT],
}

#[repr(C)]
#[derive(Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct MailboxBlock {
    pub mailbox: [U32; MAILBOX_COUNT],
    pub magic: U32,
    pub version: U32,
    pub intgen: [IntgenBlock; INTGEN_COUNT],
}

const _: () = assert!(size_of::<IntgenBlock>() == 2 * SOURCE_COUNT * 4);
const _: () = assert!(size_of::<MailboxBlock>() == 0x488);
const _: () = assert!(size_of::<MailboxBlock>() <= MBOX_RESERVED_LEN);

#[cfg(test)]
mod tests {
    use core::mem::offset_of;

    use super::*;

    #[test]
    fn test_field_offsets() {
        assert_eq!(offset_of!(MailboxBlock, mailbox), 0x000);
        assert_eq!(offset_of!(MailboxBlock, magic), 0x080);
        assert_eq!(offset_of!(MailboxBlock, version), 0x084);
        assert_eq!(offset_of!(MailboxBlock, intgen), 0x088);
        assert_eq!(offset_of!(IntgenBlock, status), 0x080);
    }

    #[test]
    fn test_words_are_little_endian() {
        let mut bytes = [0u8; size_of::<MailboxBlock>()];
        let block = MailboxBlock::mut_from_bytes(&mut bytes[..]).unwrap();
        block.magic = U32::new(MBOX_MAGIC);
        block.intgen[1].status[2] = U32::new(1);

        assert_eq!(&bytes[0x80..0x84], &[0x58, 0x4f, 0x42, 0x4d]);
        let status_off = 0x88 + size_of::<IntgenBlock>() + 0x80 + 2 * 4;
        assert_eq!(&bytes[status_off..status_off + 4], &[1, 0, 0, 0]);
    }
}
