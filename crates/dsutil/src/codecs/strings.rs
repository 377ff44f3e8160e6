//! `Bytes`, `Ascii` and `Unicode` columns.
//!
//! Each item is an unsigned LEB128 header holding `len + 1`, followed by `len` bytes. A header of
//! 0 is None, so empty strings and None stay distinct.

use super::{mismatched, unexpected, ColumnCodec};
use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::hash::hash_bytes;
use crate::types::ValueType;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strings {
    Bytes,
    Ascii,
    Unicode,
}

fn put_varint(mut v: u64, out: &mut Vec<u8>) {
    while v >= 0x80 {
        out.push((v as u8) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn take_varint(input: &mut BlockReader) -> Result<u64> {
    let mut v = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = input.read_u8()?;
        v |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(v);
        }
    }
    Err(DsutilError::Corrupt("string length header overflows".to_owned()))
}

impl Strings {
    fn payload(value: &Value) -> Option<&[u8]> {
        match value {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl ColumnCodec for Strings {
    fn supports_order(&self) -> bool {
        false
    }

    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        match (self, value) {
            (Strings::Bytes, Value::Bytes(b)) => Ok(Value::Bytes(b.clone())),
            (Strings::Unicode, Value::Text(s)) => Ok(Value::Text(s.clone())),
            (Strings::Ascii, Value::Text(s)) if s.is_ascii() => Ok(Value::Text(s.clone())),
            (Strings::Ascii, Value::Bytes(b)) if b.is_ascii() => {
                Ok(Value::Text(b.iter().copied().map(char::from).collect()))
            }
            (Strings::Ascii, Value::Text(_) | Value::Bytes(_)) => {
                Err(DsutilError::domain(ty, format!("{value} is not ASCII")))
            }
            (_, other) => Err(unexpected(ty, other)),
        }
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        if value.is_none() {
            out.push(0);
            return Ok(());
        }
        let bytes = Self::payload(value).ok_or_else(|| mismatched(value))?;
        put_varint(bytes.len() as u64 + 1, out);
        out.extend_from_slice(bytes);
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        let header = take_varint(input)?;
        if header == 0 {
            return Ok(Value::None);
        }
        let len = usize::try_from(header - 1)
            .map_err(|_| DsutilError::Corrupt(format!("string length {header} too large")))?;
        let bytes = input.read_vec(len)?;
        match self {
            Strings::Bytes => Ok(Value::Bytes(bytes)),
            Strings::Ascii if !bytes.is_ascii() => {
                Err(DsutilError::Corrupt("non-ASCII data in Ascii column".to_owned()))
            }
            Strings::Ascii | Strings::Unicode => String::from_utf8(bytes)
                .map(Value::Text)
                .map_err(|err| DsutilError::Corrupt(format!("invalid UTF-8 in column: {err}"))),
        }
    }

    fn hash(&self, value: &Value) -> u64 {
        Self::payload(value).map_or(0, hash_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_header_lengths() {
        let mut out = Vec::new();
        put_varint(1, &mut out);
        assert_eq!(out, [1]);
        out.clear();
        put_varint(128, &mut out);
        assert_eq!(out, [0x80, 0x01]);
        out.clear();
        put_varint((1 << 21) - 1, &mut out);
        assert_eq!(out.len(), 3);
        out.clear();
        put_varint(2090 * 1024 + 1, &mut out);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn ascii_coerces_bytes_to_text() {
        assert_eq!(
            Strings::Ascii
                .validate(ValueType::Ascii, &Value::from(&b"a\r\n"[..]))
                .unwrap(),
            Value::from("a\r\n")
        );
        assert!(matches!(
            Strings::Ascii.validate(ValueType::Ascii, &Value::from("foo\u{e4}")),
            Err(DsutilError::ValueDomain { .. })
        ));
        assert!(matches!(
            Strings::Bytes.validate(ValueType::Bytes, &Value::from("a")),
            Err(DsutilError::ValueDomain { .. })
        ));
        assert!(matches!(
            Strings::Unicode.validate(ValueType::Unicode, &Value::from(&b"a"[..])),
            Err(DsutilError::ValueDomain { .. })
        ));
    }
}
