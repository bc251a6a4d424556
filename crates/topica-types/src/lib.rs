//! `topica-types` – shared vocabulary for the Topica broker.
//!
//! Every crate in the workspace speaks in terms of the nine wire type tags
//! ([`TopicType`]), the typed view over a topic's raw bytes ([`TopicValue`]),
//! and the global error type ([`TopicaError`]).

use std::fmt;

use thiserror::Error;

/// Prefix of the per-session virtual paths. Never stored in a registry.
pub const VIRTUAL_PREFIX: &str = "/me/";

/// Whether `path` lives in the per-session namespace. The prefix matches
/// case-insensitively, so `/ME/id` is as virtual as `/me/id`.
pub fn is_virtual(path: &str) -> bool {
    path.get(..VIRTUAL_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(VIRTUAL_PREFIX))
}

/// Stable type tag carried next to every value on the wire.
///
/// The broker only echoes the tag it stored; receivers use it to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TopicType {
    /// Opaque byte list.
    Bytes = 0x01,
    Int16 = 0x02,
    Int32 = 0x03,
    Int64 = 0x04,
    Float32 = 0x05,
    Float64 = 0x06,
    /// UTF-8 text.
    String = 0x07,
    Boolean = 0x08,
    /// Application-defined encoding, opaque to the broker.
    Custom = 0x09,
}

impl TopicType {
    /// Every tag, in numeric order.
    pub const ALL: [TopicType; 9] = [
        TopicType::Bytes,
        TopicType::Int16,
        TopicType::Int32,
        TopicType::Int64,
        TopicType::Float32,
        TopicType::Float64,
        TopicType::String,
        TopicType::Boolean,
        TopicType::Custom,
    ];

    /// Map a wire tag back to its type. Returns `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// The numeric wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Encoded width in bytes for fixed-width types, `None` for variable ones.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            TopicType::Int16 => Some(2),
            TopicType::Int32 | TopicType::Float32 => Some(4),
            TopicType::Int64 | TopicType::Float64 => Some(8),
            TopicType::Boolean => Some(1),
            TopicType::Bytes | TopicType::String | TopicType::Custom => None,
        }
    }

    /// Check that `data` is a well-formed encoding of this type.
    pub fn validate(self, data: &[u8]) -> Result<(), ValueError> {
        if let Some(expected) = self.fixed_width()
            && data.len() != expected
        {
            return Err(ValueError::Width {
                ty: self,
                expected,
                actual: data.len(),
            });
        }
        if self == TopicType::String && std::str::from_utf8(data).is_err() {
            return Err(ValueError::Utf8);
        }
        Ok(())
    }
}

impl fmt::Display for TopicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopicType::Bytes => "bytes",
            TopicType::Int16 => "int16",
            TopicType::Int32 => "int32",
            TopicType::Int64 => "int64",
            TopicType::Float32 => "float32",
            TopicType::Float64 => "float64",
            TopicType::String => "string",
            TopicType::Boolean => "boolean",
            TopicType::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// A decoded topic value.
///
/// All numbers are big-endian on the wire. Booleans encode as a single byte
/// `0x01`/`0x00`; any non-zero byte decodes as `true`.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicValue {
    Bytes(Vec<u8>),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Boolean(bool),
    Custom(Vec<u8>),
}

impl TopicValue {
    /// The wire type of this value.
    pub fn topic_type(&self) -> TopicType {
        match self {
            TopicValue::Bytes(_) => TopicType::Bytes,
            TopicValue::Int16(_) => TopicType::Int16,
            TopicValue::Int32(_) => TopicType::Int32,
            TopicValue::Int64(_) => TopicType::Int64,
            TopicValue::Float32(_) => TopicType::Float32,
            TopicValue::Float64(_) => TopicType::Float64,
            TopicValue::String(_) => TopicType::String,
            TopicValue::Boolean(_) => TopicType::Boolean,
            TopicValue::Custom(_) => TopicType::Custom,
        }
    }

    /// Raw bytes as stored in a topic and sent on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            TopicValue::Bytes(b) | TopicValue::Custom(b) => b.clone(),
            TopicValue::Int16(v) => v.to_be_bytes().to_vec(),
            TopicValue::Int32(v) => v.to_be_bytes().to_vec(),
            TopicValue::Int64(v) => v.to_be_bytes().to_vec(),
            TopicValue::Float32(v) => v.to_be_bytes().to_vec(),
            TopicValue::Float64(v) => v.to_be_bytes().to_vec(),
            TopicValue::String(s) => s.as_bytes().to_vec(),
            TopicValue::Boolean(b) => vec![u8::from(*b)],
        }
    }

    /// Interpret `data` as a value of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when a fixed-width type has the wrong number of
    /// bytes or a string is not valid UTF-8.
    pub fn decode(ty: TopicType, data: &[u8]) -> Result<Self, ValueError> {
        ty.validate(data)?;
        let value = match ty {
            TopicType::Bytes => TopicValue::Bytes(data.to_vec()),
            TopicType::Custom => TopicValue::Custom(data.to_vec()),
            TopicType::Int16 => TopicValue::Int16(i16::from_be_bytes(fixed(ty, data)?)),
            TopicType::Int32 => TopicValue::Int32(i32::from_be_bytes(fixed(ty, data)?)),
            TopicType::Int64 => TopicValue::Int64(i64::from_be_bytes(fixed(ty, data)?)),
            TopicType::Float32 => TopicValue::Float32(f32::from_be_bytes(fixed(ty, data)?)),
            TopicType::Float64 => TopicValue::Float64(f64::from_be_bytes(fixed(ty, data)?)),
            TopicType::String => {
                TopicValue::String(std::str::from_utf8(data).map_err(|_| ValueError::Utf8)?.to_string())
            }
            TopicType::Boolean => TopicValue::Boolean(data[0] != 0),
        };
        Ok(value)
    }
}

fn fixed<const N: usize>(ty: TopicType, data: &[u8]) -> Result<[u8; N], ValueError> {
    data.try_into().map_err(|_| ValueError::Width {
        ty,
        expected: N,
        actual: data.len(),
    })
}

/// A byte payload that does not match its declared [`TopicType`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("{ty} value must be {expected} bytes, got {actual}")]
    Width {
        ty: TopicType,
        expected: usize,
        actual: usize,
    },

    #[error("string value is not valid UTF-8")]
    Utf8,
}

/// Global error type spanning codec failures, registry rejections and
/// transport faults.
#[derive(Error, Debug)]
pub enum TopicaError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Type mismatch on {path}: stored {stored}, requested {requested}")]
    TypeMismatch {
        path: String,
        stored: TopicType,
        requested: TopicType,
    },

    #[error("Strict mode rejected creation of {0}")]
    StrictRejected(String),

    #[error("Reserved path cannot be stored: {0}")]
    ReservedPath(String),

    #[error("Invalid subscription interval {0} ms")]
    InvalidInterval(i32),

    #[error("Subscription limit of {0} reached")]
    SubscriptionLimit(usize),

    #[error("Invalid value: {0}")]
    InvalidValue(#[from] ValueError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
