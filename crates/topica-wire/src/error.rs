use thiserror::Error;
use topica_types::{TopicaError, ValueError};

/// Reasons a frame cannot be decoded or encoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("frame truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    #[error("expected a response frame, got opcode {0:#x}")]
    NotAResponse(u8),

    #[error("unknown type tag {0:#04x}")]
    UnknownType(u8),

    #[error("path is not valid UTF-8")]
    InvalidPath,

    #[error("path is {0} bytes, the limit is 4095")]
    PathTooLong(usize),

    #[error("payload of {0} bytes does not fit a 32-bit length")]
    DataTooLong(usize),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl From<WireError> for TopicaError {
    fn from(e: WireError) -> Self {
        TopicaError::MalformedFrame(e.to_string())
    }
}
