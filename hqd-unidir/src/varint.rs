//! Variable-length integer encoding per RFC 9000 Section 16.
//!
//! Stream type prefaces and push IDs on unidirectional streams use QUIC's
//! variable-length integer encoding: the two most significant bits of the
//! first byte select a 1, 2, 4 or 8 byte encoding.

use crate::error::VarintError;
use bytes::{Buf, BufMut};

/// Maximum value that can be encoded (2^62 - 1)
pub const MAX: u64 = (1u64 << 62) - 1;

/// Longest possible encoding.
pub const MAX_LEN: usize = 8;

/// Encoded length selected by the first byte of a varint.
#[inline]
pub fn len_from_first_byte(first: u8) -> usize {
    1 << (first >> 6)
}

/// Decode a variable-length integer without consuming anything.
///
/// Returns `None` if `data` does not yet hold the full encoding. Callers
/// retry with a longer view once more bytes arrive.
pub fn peek(data: &[u8]) -> Option<(u64, usize)> {
    let first = *data.first()?;
    let len = len_from_first_byte(first);
    if data.len() < len {
        return None;
    }

    let value = data[1..len]
        .iter()
        .fold((first & 0x3f) as u64, |acc, b| (acc << 8) | *b as u64);
    Some((value, len))
}

/// Decode a variable-length integer from a byte slice.
///
/// Returns the decoded value and the number of bytes consumed.
///
/// # Errors
///
/// Returns `Incomplete` if the buffer is shorter than the encoding.
pub fn decode(data: &[u8]) -> Result<(u64, usize), VarintError> {
    peek(data).ok_or_else(|| VarintError::Incomplete {
        needed: data.first().map_or(1, |b| len_from_first_byte(*b)),
        available: data.len(),
    })
}

/// Encode a variable-length integer into a byte buffer.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns error if the value exceeds MAX or buffer is too small.
pub fn encode(value: u64, buf: &mut [u8]) -> Result<usize, VarintError> {
    if value > MAX {
        return Err(VarintError::Overflow(value));
    }

    let len = encoded_len(value);
    if buf.len() < len {
        return Err(VarintError::BufferTooSmall {
            needed: len,
            available: buf.len(),
        });
    }

    let tag: u8 = match len {
        1 => 0x00,
        2 => 0x40,
        4 => 0x80,
        _ => 0xc0,
    };
    for (i, byte) in buf[..len].iter_mut().enumerate() {
        *byte = (value >> (8 * (len - 1 - i))) as u8;
    }
    buf[0] |= tag;
    Ok(len)
}

/// Decode a variable-length integer from a buffer that implements Buf.
///
/// Returns the decoded value and advances the buffer by the number of bytes consumed.
/// On `Incomplete` the buffer is left untouched.
pub fn decode_buf<B: Buf>(buf: &mut B) -> Result<u64, VarintError> {
    if !buf.has_remaining() {
        return Err(VarintError::Incomplete {
            needed: 1,
            available: 0,
        });
    }

    let len = len_from_first_byte(buf.chunk()[0]);
    if buf.remaining() < len {
        return Err(VarintError::Incomplete {
            needed: len,
            available: buf.remaining(),
        });
    }

    let mut tmp = [0u8; MAX_LEN];
    buf.copy_to_slice(&mut tmp[..len]);
    let (value, _) = decode(&tmp[..len])?;
    Ok(value)
}

/// Encode a variable-length integer into a buffer that implements BufMut.
pub fn encode_buf<B: BufMut>(value: u64, buf: &mut B) -> Result<usize, VarintError> {
    let required = encoded_len(value);
    if buf.remaining_mut() < required {
        return Err(VarintError::BufferTooSmall {
            needed: required,
            available: buf.remaining_mut(),
        });
    }

    let mut temp = [0u8; MAX_LEN];
    let written = encode(value, &mut temp)?;
    buf.put_slice(&temp[..written]);
    Ok(written)
}

/// Calculate the encoded length of a varint without encoding it.
pub fn encoded_len(value: u64) -> usize {
    if value < 64 {
        1
    } else if value < 16384 {
        2
    } else if value < 1073741824 {
        4
    } else {
        8
    }
}
