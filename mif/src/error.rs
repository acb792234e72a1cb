use scsc_mbox::MboxError;
use scsc_regmap::RegmapError;
use thiserror::Error;

use crate::irq::IrqLine;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum MifError {
    #[error("register access failed: {0}")]
    RegisterAccessFailed(#[from] RegmapError),
    #[error("timed out waiting for {what}")]
    Timeout { what: &'static str },
    #[error("configuration request arrived in an unexpected boot state")]
    ProtocolViolation,
    #[error("no free interrupt bit")]
    Exhausted,
    #[error("shared memory is already mapped")]
    AlreadyMapped,
    #[error("shared memory is not mapped")]
    NotMapped,
    #[error("transport is latched in reset failure")]
    ResetFailed,
    #[error("index {index} out of range (limit {limit})")]
    OutOfRange { index: u32, limit: u32 },
    #[error("device not responding: {what}")]
    NoDevice { what: &'static str },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("failed to request irq line {line:?}")]
    IrqRequestFailed { line: IrqLine },
    #[error("failed to map shared memory")]
    MappingFailed,
    #[error("operation not supported by this transport")]
    Unsupported,
}

impl From<MboxError> for MifError {
    fn from(err: MboxError) -> Self {
        match err {
            MboxError::SourceOutOfRange(index) => MifError::OutOfRange {
                index,
                limit: scsc_mbox::SOURCE_COUNT as u32,
            },
            MboxError::MailboxOutOfRange(index) => MifError::OutOfRange {
                index,
                limit: scsc_mbox::MAILBOX_COUNT as u32,
            },
            MboxError::RegionTooSmall { .. } => MifError::MappingFailed,
        }
    }
}

pub type MifResult<T> = Result<T, MifError>;
