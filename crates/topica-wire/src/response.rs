//! Server → client frames.

use bytes::{BufMut, Bytes, BytesMut};
use topica_types::{TopicType, TopicValue, ValueError};

use crate::WireError;
use crate::header::{FrameReader, data_len, put_header};

/// High nibble marking a response frame.
pub const RESPONSE_FLAG: u8 = 0x8;

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub path: String,
    pub ty: TopicType,
    pub data: Bytes,
}

impl Response {
    /// Decode the payload according to its type tag.
    pub fn value(&self) -> Result<TopicValue, ValueError> {
        TopicValue::decode(self.ty, &self.data)
    }
}

/// Encode a response carrying `data` of type `ty` for `path`.
///
/// # Errors
///
/// Returns [`WireError::PathTooLong`] when the path does not fit the 12-bit
/// length field.
pub fn encode_response(path: &str, ty: TopicType, data: &[u8]) -> Result<Bytes, WireError> {
    let mut out = BytesMut::with_capacity(2 + path.len() + 5 + data.len());
    put_header(&mut out, RESPONSE_FLAG, path)?;
    out.put_u8(ty.tag());
    out.put_u32(data_len(data)?);
    out.put_slice(data);
    Ok(out.freeze())
}

/// Decode a response frame (client side).
///
/// The payload is not checked against the type tag; call
/// [`Response::value`] for a typed view.
pub fn decode_response(frame: &[u8]) -> Result<Response, WireError> {
    let mut reader = FrameReader::new(frame);
    let (nibble, path) = reader.header()?;
    if nibble != RESPONSE_FLAG {
        return Err(WireError::NotAResponse(nibble));
    }
    let (tag, data) = reader.typed_data()?;
    let ty = TopicType::from_tag(tag).ok_or(WireError::UnknownType(tag))?;
    Ok(Response {
        path,
        ty,
        data: Bytes::copy_from_slice(data),
    })
}
