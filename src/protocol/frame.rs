//! Frame header encoding and decoding (RFC 6455 Section 5.2).
//!
//! Only headers are handled here. Payload bytes stay in the connection's
//! buffers and are streamed through to the caller, so a frame never has to be
//! held in memory as a whole.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! ```

use crate::error::{Error, Result};
use crate::message::CloseCode;
use crate::protocol::OpCode;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Longest close reason that fits next to the 2-byte status.
pub const MAX_CLOSE_REASON_LEN: usize = MAX_CONTROL_FRAME_PAYLOAD - 2;

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present iff the MASK bit was set.
    pub mask: Option<[u8; 4]>,
    /// Payload length as announced on the wire.
    pub payload_len: u64,
}

impl FrameHeader {
    /// Header for an outgoing frame with no reserved bits set.
    #[must_use]
    pub const fn new(fin: bool, opcode: OpCode, payload_len: u64, mask: Option<[u8; 4]>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask,
            payload_len,
        }
    }

    /// Number of header bytes implied by the first two bytes of a frame.
    #[must_use]
    pub const fn len_from_prefix(byte1: u8) -> usize {
        let extended = match byte1 & 0x7F {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let mask = if byte1 & 0x80 != 0 { 4 } else { 0 };
        2 + extended + mask
    }

    /// Parse a header from the start of `buf`.
    ///
    /// Returns the header and the number of bytes it occupies.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` does not hold the whole header yet
    /// - `Error::ReservedOpcode` for reserved opcodes
    /// - `Error::InvalidPayloadLength` if a 64-bit length has its top bit set
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];
        let opcode = OpCode::from_u8(byte0)?;

        let header_len = Self::len_from_prefix(byte1);
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let (payload_len, mask_offset) = match byte1 & 0x7F {
            126 => (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4),
            127 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(raw);
                if len > i64::MAX as u64 {
                    return Err(Error::InvalidPayloadLength(len));
                }
                (len, 10)
            }
            short => (u64::from(short), 2),
        };

        let mask = if byte1 & 0x80 != 0 {
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[mask_offset..mask_offset + 4]);
            Some(key)
        } else {
            None
        };

        let header = FrameHeader {
            fin: byte0 & 0x80 != 0,
            rsv1: byte0 & 0x40 != 0,
            rsv2: byte0 & 0x20 != 0,
            rsv3: byte0 & 0x10 != 0,
            opcode,
            mask,
            payload_len,
        };
        Ok((header, header_len))
    }

    /// Number of bytes [`write`](Self::write) produces.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let extended = if self.payload_len <= 125 {
            0
        } else if self.payload_len <= 0xFFFF {
            2
        } else {
            8
        };
        let mask = if self.mask.is_some() { 4 } else { 0 };
        2 + extended + mask
    }

    /// Write the header to the start of `buf`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProtocolViolation` if `buf` is shorter than
    /// [`encoded_len`](Self::encoded_len).
    pub fn write(&self, buf: &mut [u8]) -> Result<usize> {
        let total = self.encoded_len();
        if buf.len() < total {
            return Err(Error::ProtocolViolation(format!(
                "header buffer too small: need {} bytes, have {}",
                total,
                buf.len()
            )));
        }

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        buf[0] = byte0;

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        let mut offset = 2;
        if self.payload_len <= 125 {
            buf[1] = mask_bit | self.payload_len as u8;
        } else if self.payload_len <= 0xFFFF {
            buf[1] = mask_bit | 126;
            buf[2..4].copy_from_slice(&(self.payload_len as u16).to_be_bytes());
            offset = 4;
        } else {
            buf[1] = mask_bit | 127;
            buf[2..10].copy_from_slice(&self.payload_len.to_be_bytes());
            offset = 10;
        }

        if let Some(key) = self.mask {
            buf[offset..offset + 4].copy_from_slice(&key);
            offset += 4;
        }

        Ok(offset)
    }
}

/// Build a Close frame payload: big-endian status followed by the reason.
#[must_use]
pub fn close_payload(code: u16, reason: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 + reason.len());
    data.extend_from_slice(&code.to_be_bytes());
    data.extend_from_slice(reason.as_bytes());
    data
}

/// Decode a received Close frame payload into its status and reason.
///
/// An empty payload carries no status.
///
/// # Errors
///
/// - `Error::ProtocolViolation` for a 1-byte payload or a non-UTF-8 reason
/// - `Error::ReceivedInvalidCloseCode` for a status the peer may not send
pub fn parse_close_payload(payload: &[u8]) -> Result<(Option<CloseCode>, String)> {
    match payload {
        [] => Ok((None, String::new())),
        [_] => Err(Error::ProtocolViolation(
            "close frame payload must be empty or at least 2 bytes".into(),
        )),
        [hi, lo, reason @ ..] => {
            let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
            if !code.is_valid_received() {
                return Err(Error::ReceivedInvalidCloseCode(code.as_u16()));
            }
            let reason = std::str::from_utf8(reason).map_err(|_| {
                Error::ProtocolViolation("close reason is not valid UTF-8".into())
            })?;
            Ok((Some(code), reason.to_owned()))
        }
    }
}
