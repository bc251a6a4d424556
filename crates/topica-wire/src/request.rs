//! Client → server frames.

use bytes::{BufMut, Bytes, BytesMut};
use topica_types::TopicType;

use crate::WireError;
use crate::header::{FrameReader, data_len, put_header};

/// Request opcode carried in the high nibble of byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x1,
    Set = 0x2,
    Subscribe = 0x3,
}

impl Opcode {
    pub fn from_nibble(nibble: u8) -> Result<Self, WireError> {
        match nibble {
            0x1 => Ok(Opcode::Get),
            0x2 => Ok(Opcode::Set),
            0x3 => Ok(Opcode::Subscribe),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get {
        path: String,
    },
    /// `data` has already been checked against `ty`.
    Set {
        path: String,
        ty: TopicType,
        data: Bytes,
    },
    /// The interval is signed on the wire; values below the broker minimum
    /// (including negatives) are rejected by the session, not the codec.
    Subscribe {
        path: String,
        interval_ms: i32,
    },
}

impl Request {
    pub fn path(&self) -> &str {
        match self {
            Request::Get { path } | Request::Set { path, .. } | Request::Subscribe { path, .. } => path,
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Get { .. } => Opcode::Get,
            Request::Set { .. } => Opcode::Set,
            Request::Subscribe { .. } => Opcode::Subscribe,
        }
    }
}

/// Decode one request frame.
///
/// # Errors
///
/// Returns [`WireError`] for truncated frames, unknown opcodes or type tags,
/// non-UTF-8 paths, and SET payloads whose length does not fit their type.
pub fn decode_request(frame: &[u8]) -> Result<Request, WireError> {
    let mut reader = FrameReader::new(frame);
    let (nibble, path) = reader.header()?;
    match Opcode::from_nibble(nibble)? {
        Opcode::Get => Ok(Request::Get { path }),
        Opcode::Set => {
            let (tag, data) = reader.typed_data()?;
            let ty = TopicType::from_tag(tag).ok_or(WireError::UnknownType(tag))?;
            ty.validate(data)?;
            Ok(Request::Set {
                path,
                ty,
                data: Bytes::copy_from_slice(data),
            })
        }
        Opcode::Subscribe => {
            let interval_ms = i32::from_be_bytes(reader.array4()?);
            Ok(Request::Subscribe { path, interval_ms })
        }
    }
}

/// Encode a request frame (used by clients and tests).
pub fn encode_request(request: &Request) -> Result<Bytes, WireError> {
    let mut out = BytesMut::with_capacity(2 + request.path().len() + 9);
    put_header(&mut out, request.opcode() as u8, request.path())?;
    match request {
        Request::Get { .. } => {}
        Request::Set { ty, data, .. } => {
            out.put_u8(ty.tag());
            out.put_u32(data_len(data)?);
            out.put_slice(data);
        }
        Request::Subscribe { interval_ms, .. } => out.put_i32(*interval_ms),
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use topica_types::TopicValue;

    #[test]
    fn get_frame_layout() {
        let frame = encode_request(&Request::Get {
            path: "/me/id".to_string(),
        })
        .unwrap();
        assert_eq!(&frame[..], b"\x10\x06/me/id");
        assert_eq!(
            decode_request(&frame).unwrap(),
            Request::Get {
                path: "/me/id".to_string()
            }
        );
    }

    #[test]
    fn set_frame_layout() {
        let frame = [
            0x20, 0x02, b'/', b'x', // header + path
            0x03, // Int32
            0x00, 0x00, 0x00, 0x04, // dataLen
            0x00, 0x00, 0x01, 0x00, // 256
        ];
        let req = decode_request(&frame).unwrap();
        assert_eq!(
            req,
            Request::Set {
                path: "/x".to_string(),
                ty: TopicType::Int32,
                data: Bytes::from(TopicValue::Int32(256).encode()),
            }
        );
        assert_eq!(&encode_request(&req).unwrap()[..], &frame);
    }

    #[test]
    fn subscribe_frame_layout() {
        let frame = [0x30, 0x02, b'/', b'x', 0x00, 0x00, 0x00, 0x32];
        assert_eq!(
            decode_request(&frame).unwrap(),
            Request::Subscribe {
                path: "/x".to_string(),
                interval_ms: 50
            }
        );
    }

    #[test]
    fn little_endian_interval_decodes_negative() {
        // 50 sent little-endian by mistake with the top bit set.
        let frame = [0x30, 0x02, b'/', b'x', 0xFF, 0xFF, 0xFF, 0xF6];
        let Request::Subscribe { interval_ms, .. } = decode_request(&frame).unwrap() else {
            panic!("expected subscribe");
        };
        assert_eq!(interval_ms, -10);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(decode_request(&[0x40, 0x00]), Err(WireError::UnknownOpcode(0x4)));
        // A response frame sent to the broker is not a request.
        assert_eq!(decode_request(&[0x80, 0x00]), Err(WireError::UnknownOpcode(0x8)));
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert!(matches!(decode_request(&[]), Err(WireError::Truncated { .. })));
        assert!(matches!(decode_request(&[0x10]), Err(WireError::Truncated { .. })));
        // SET declaring 8 data bytes but carrying 2.
        let frame = [0x20, 0x01, b'/', 0x01, 0, 0, 0, 8, 1, 2];
        assert!(matches!(decode_request(&frame), Err(WireError::Truncated { .. })));
        // SUBSCRIBE missing its interval.
        assert!(matches!(decode_request(&[0x30, 0x01, b'/', 0, 0]), Err(WireError::Truncated { .. })));
    }

    #[test]
    fn set_with_unknown_type_is_rejected() {
        let frame = [0x20, 0x01, b'/', 0x0A, 0, 0, 0, 0];
        assert_eq!(decode_request(&frame), Err(WireError::UnknownType(0x0A)));
    }

    #[test]
    fn set_with_wrong_width_is_rejected() {
        let frame = [0x20, 0x01, b'/', 0x06, 0, 0, 0, 2, 1, 2];
        assert!(matches!(decode_request(&frame), Err(WireError::Value(_))));
    }

    #[test]
    fn non_utf8_path_is_rejected() {
        assert_eq!(decode_request(&[0x10, 0x01, 0xFF]), Err(WireError::InvalidPath));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let frame = [0x10, 0x02, b'/', b'x', 0xDE, 0xAD];
        assert_eq!(
            decode_request(&frame).unwrap(),
            Request::Get { path: "/x".to_string() }
        );
    }

    #[test]
    fn multibyte_path_length_counts_bytes() {
        let frame = encode_request(&Request::Get {
            path: "/é".to_string(),
        })
        .unwrap();
        assert_eq!(frame[1], 3);
    }
}
