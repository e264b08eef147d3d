//! Decoding of the built-in text type
//!
//! A string object holds its characters in a backing array referenced by the
//! `value` field:
//!
//! - `char[]`: UTF-16 code units
//! - `byte[]` with `coder == 0` (or no `coder` field): Latin-1
//! - `byte[]` with `coder == 1`: UTF-16 code units in target byte order

use std::fmt;

use crate::error::{HeapError, HeapResult};
use crate::oops::{array, Oop, OopKind};
use crate::target::FieldType;
use crate::visitor::FieldValue;

/// Field referencing the backing array
pub const VALUE_FIELD: &str = "value";
/// Field selecting the byte encoding of a `byte[]` backing array
pub const CODER_FIELD: &str = "coder";

const CODER_LATIN1: i64 = 0;
const CODER_UTF16: i64 = 1;

fn malformed(string: &Oop<'_>, reason: impl fmt::Display) -> HeapError {
    HeapError::memory_access(
        string.handle().address(),
        format!("malformed string: {}", reason),
    )
}

/// Decode the characters of a string object
pub fn decode_string(string: &Oop<'_>) -> HeapResult<String> {
    let backing = match string.field(VALUE_FIELD)? {
        Some(FieldValue::Reference(Some(handle))) => handle,
        Some(FieldValue::Reference(None)) => return Err(malformed(string, "null backing array")),
        Some(other) => return Err(malformed(string, format!("unexpected value field {}", other))),
        None => return Err(malformed(string, "no value field")),
    };

    let array = string.heap().resolve(backing)?;
    let big_endian = string.heap().layout().big_endian;
    match array.kind() {
        OopKind::TypeArray(FieldType::Char) => {
            Ok(decode_utf16(&array::read_payload_bytes(&array)?, big_endian))
        }
        OopKind::TypeArray(FieldType::Byte) => {
            let coder = match string.field(CODER_FIELD)? {
                None => CODER_LATIN1,
                Some(value) => value
                    .as_i64()
                    .ok_or_else(|| malformed(string, format!("unexpected coder {}", value)))?,
            };
            let bytes = array::read_payload_bytes(&array)?;
            match coder {
                CODER_LATIN1 => Ok(decode_latin1(&bytes)),
                CODER_UTF16 if bytes.len() % 2 != 0 => Err(malformed(
                    string,
                    format!("odd UTF-16 byte length {}", bytes.len()),
                )),
                CODER_UTF16 => Ok(decode_utf16(&bytes, big_endian)),
                other => Err(malformed(string, format!("unknown coder {}", other))),
            }
        }
        _ => Err(malformed(
            string,
            format!("backing object is a {}", array.type_name()),
        )),
    }
}

/// Latin-1 bytes to text
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// UTF-16 code units to text; unpaired surrogates become U+FFFD
pub fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let units = bytes.chunks_exact(2).map(|pair| {
        let pair = [pair[0], pair[1]];
        if big_endian {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    });
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1() {
        assert_eq!(decode_latin1(b"hello"), "hello");
        assert_eq!(decode_latin1(&[0x63, 0x61, 0x66, 0xe9]), "café");
        assert_eq!(decode_latin1(&[]), "");
    }

    #[test]
    fn test_utf16_byte_orders() {
        let little = [0x68, 0x00, 0x69, 0x00];
        let big = [0x00, 0x68, 0x00, 0x69];
        assert_eq!(decode_utf16(&little, false), "hi");
        assert_eq!(decode_utf16(&big, true), "hi");
    }

    #[test]
    fn test_utf16_surrogates() {
        // U+1F600 as a surrogate pair, then a lone high surrogate
        let bytes = [0x3d, 0xd8, 0x00, 0xde, 0x3d, 0xd8];
        assert_eq!(decode_utf16(&bytes, false), "\u{1F600}\u{FFFD}");
    }
}
