//! Big-endian primitive codec
//!
//! Fixed-width integers are written big-endian via `byteorder`. Strings
//! are written as a u16 byte length followed by "modified UTF-8":
//!
//! - U+0000 is encoded as the two bytes `C0 80`
//! - characters outside the Basic Multilingual Plane are split into a
//!   UTF-16 surrogate pair, each surrogate encoded as three bytes
//! - everything else is encoded as in standard UTF-8
//!
//! This keeps journals and dumps byte-compatible with existing tooling
//! that reads them through a `DataInput`-style reader.

use crate::error::{JournalError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Longest encoded string, in bytes
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Encode `s` as modified UTF-8 without the length prefix
pub fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut units = [0u16; 2];
    for ch in s.chars() {
        for unit in ch.encode_utf16(&mut units).iter() {
            let c = *unit;
            match c {
                0x0001..=0x007F => out.push(c as u8),
                0x0000 | 0x0080..=0x07FF => {
                    out.push(0xC0 | ((c >> 6) & 0x1F) as u8);
                    out.push(0x80 | (c & 0x3F) as u8);
                }
                _ => {
                    out.push(0xE0 | ((c >> 12) & 0x0F) as u8);
                    out.push(0x80 | ((c >> 6) & 0x3F) as u8);
                    out.push(0x80 | (c & 0x3F) as u8);
                }
            }
        }
    }
    out
}

/// Decode modified UTF-8 bytes
///
/// # Errors
///
/// [`JournalError::Corrupt`] on malformed sequences or unpaired surrogates.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            units.push(u16::from(b0));
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            units.push((u16::from(b0 & 0x1F) << 6) | u16::from(b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            units.push(
                (u16::from(b0 & 0x0F) << 12) | (u16::from(b1 & 0x3F) << 6) | u16::from(b2 & 0x3F),
            );
            i += 3;
        } else {
            return Err(JournalError::Corrupt(format!(
                "invalid modified UTF-8 lead byte {:#04x}",
                b0
            )));
        }
    }
    String::from_utf16(&units)
        .map_err(|_| JournalError::Corrupt("unpaired surrogate in string".to_string()))
}

fn continuation(bytes: &[u8], at: usize) -> Result<u8> {
    match bytes.get(at) {
        Some(b) if b & 0xC0 == 0x80 => Ok(*b),
        _ => Err(JournalError::Corrupt(
            "truncated modified UTF-8 sequence".to_string(),
        )),
    }
}

/// Write a length-prefixed modified UTF-8 string
pub fn write_utf<W: Write>(w: &mut W, s: &str) -> Result<()> {
    let encoded = encode_modified_utf8(s);
    if encoded.len() > MAX_UTF_LEN {
        return Err(JournalError::StringTooLong(encoded.len()));
    }
    w.write_u16::<BigEndian>(encoded.len() as u16)?;
    w.write_all(&encoded)?;
    Ok(())
}

/// Read a length-prefixed modified UTF-8 string
pub fn read_utf<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    decode_modified_utf8(&buf)
}

/// Read a string and require it to equal `expected`
pub fn expect_utf<R: Read>(r: &mut R, expected: &str) -> Result<()> {
    let found = read_utf(r)?;
    if found == expected {
        Ok(())
    } else {
        Err(JournalError::Corrupt(format!(
            "expected marker '{}', found '{}'",
            expected, found
        )))
    }
}
