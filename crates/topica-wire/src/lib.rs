//! `topica-wire` – bit-exact codec for Topica request and response frames.
//!
//! Pure functions only: no I/O and no shared state.
//!
//! # Frame layout
//!
//! Every frame starts with the same two-byte header followed by the UTF-8
//! path. All multi-byte integers are big-endian.
//!
//! ```text
//! ┌───────────────┬───────────────┬─────────────────────┬─────────────────┐
//! │ byte 0        │ byte 1        │ path (pathLen bytes)│ payload         │
//! │ hi: opcode    │ low 8 bits of │ UTF-8               │ opcode-specific │
//! │ lo: pathLen≫8 │ pathLen       │                     │                 │
//! └───────────────┴───────────────┴─────────────────────┴─────────────────┘
//! ```
//!
//! | Opcode | Direction | Payload |
//! |---|---|---|
//! | `0x1` GET | client → server | none |
//! | `0x2` SET | client → server | `type:u8` `dataLen:u32` `data` |
//! | `0x3` SUBSCRIBE | client → server | `intervalMs:i32` |
//! | `0x8` response | server → client | `type:u8` `dataLen:u32` `data` |
//!
//! Trailing bytes after a complete frame are ignored.

mod error;
mod header;
pub mod request;
pub mod response;

pub use error::WireError;
pub use header::MAX_PATH_LEN;
pub use request::{Opcode, Request, decode_request, encode_request};
pub use response::{RESPONSE_FLAG, Response, decode_response, encode_response};
