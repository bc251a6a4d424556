//! Shared two-byte header and a bounds-checked frame reader.

use bytes::{BufMut, BytesMut};

use crate::WireError;

/// Largest path expressible in the 12-bit length field.
pub const MAX_PATH_LEN: usize = 0x0FFF;

/// Write the nibble/path-length header followed by the path bytes.
pub(crate) fn put_header(out: &mut BytesMut, nibble: u8, path: &str) -> Result<(), WireError> {
    let len = path.len();
    if len > MAX_PATH_LEN {
        return Err(WireError::PathTooLong(len));
    }
    out.put_u8((nibble << 4) | ((len >> 8) as u8 & 0x0F));
    out.put_u8((len & 0xFF) as u8);
    out.put_slice(path.as_bytes());
    Ok(())
}

pub(crate) fn data_len(data: &[u8]) -> Result<u32, WireError> {
    u32::try_from(data.len()).map_err(|_| WireError::DataTooLong(data.len()))
}

/// Cursor over an inbound frame. Every read fails with
/// [`WireError::Truncated`] instead of panicking.
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn array4(&mut self) -> Result<[u8; 4], WireError> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.take(4)?);
        Ok(out)
    }

    /// Read the header, returning `(high nibble, path)`.
    pub(crate) fn header(&mut self) -> Result<(u8, String), WireError> {
        let first = self.u8()?;
        let second = self.u8()?;
        let path_len = (usize::from(first & 0x0F) << 8) | usize::from(second);
        let path = std::str::from_utf8(self.take(path_len)?)
            .map_err(|_| WireError::InvalidPath)?
            .to_string();
        Ok((first >> 4, path))
    }

    /// Read a `[type:u8][dataLen:u32][data]` block.
    pub(crate) fn typed_data(&mut self) -> Result<(u8, &'a [u8]), WireError> {
        let tag = self.u8()?;
        let len = u32::from_be_bytes(self.array4()?) as usize;
        Ok((tag, self.take(len)?))
    }
}
