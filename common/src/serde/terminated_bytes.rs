//! Order-preserving encoding for variable-length byte strings.
//!
//! Bytes are escaped and terminated with `0x00`:
//!
//! - `0x00` → `0x01 0x01`
//! - `0x01` → `0x01 0x02`
//! - `0xFF` → `0x01 0x03`
//! - All other bytes unchanged
//!
//! Because the terminator is the smallest byte, a shorter string sorts
//! before any longer string it prefixes, and the encoding of `a` is never a
//! prefix of the encoding of `ab`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::DeserializeError;

const TERMINATOR: u8 = 0x00;
const ESCAPE: u8 = 0x01;

/// Appends the terminated encoding of `data` to `buf`.
pub fn serialize(data: &[u8], buf: &mut BytesMut) {
    buf.reserve(data.len() + 1);
    for &b in data {
        match b {
            0x00 => buf.put_slice(&[ESCAPE, 0x01]),
            0x01 => buf.put_slice(&[ESCAPE, 0x02]),
            0xFF => buf.put_slice(&[ESCAPE, 0x03]),
            other => buf.put_u8(other),
        }
    }
    buf.put_u8(TERMINATOR);
}

/// Reads one terminated value from the front of `buf`, advancing past the
/// terminator.
pub fn deserialize(buf: &mut &[u8]) -> Result<Bytes, DeserializeError> {
    let mut out = BytesMut::new();
    loop {
        if !buf.has_remaining() {
            return Err(DeserializeError::new("unterminated byte string"));
        }
        match buf.get_u8() {
            TERMINATOR => return Ok(out.freeze()),
            ESCAPE => {
                if !buf.has_remaining() {
                    return Err(DeserializeError::new("dangling escape byte"));
                }
                let unescaped = match buf.get_u8() {
                    0x01 => 0x00,
                    0x02 => 0x01,
                    0x03 => 0xFF,
                    other => {
                        return Err(DeserializeError::new(format!(
                            "invalid escape sequence 0x01 0x{:02x}",
                            other
                        )));
                    }
                };
                out.put_u8(unescaped);
            }
            other => out.put_u8(other),
        }
    }
}
