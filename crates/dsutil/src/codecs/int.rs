//! Fixed-width integer columns: `Int64`, `Int32` (signed, minimum value reserved for None) and
//! `Bits64`, `Bits32` (unsigned, every bit pattern is data, no None).

use std::cmp::Ordering;

use super::{integer_input, mismatched, ColumnCodec};
use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::hash::{hash_i64, hash_u64};
use crate::types::ValueType;
use crate::value::Value;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedInt {
    pub bits: u32,
    pub signed: bool,
}

impl FixedInt {
    /// Inclusive range of storable values. For signed columns the type's minimum is excluded
    /// since it encodes None.
    fn range(self) -> (i128, i128) {
        match (self.bits, self.signed) {
            (64, true) => (i128::from(i64::MIN) + 1, i128::from(i64::MAX)),
            (32, true) => (i128::from(i32::MIN) + 1, i128::from(i32::MAX)),
            (64, false) => (0, i128::from(u64::MAX)),
            _ => (0, i128::from(u32::MAX)),
        }
    }

    fn null_sentinel(self) -> i128 {
        if self.bits == 64 {
            i128::from(i64::MIN)
        } else {
            i128::from(i32::MIN)
        }
    }

    fn as_i128(value: &Value) -> Option<i128> {
        match value {
            Value::Int(v) => Some(i128::from(*v)),
            Value::BigInt(v) => num_traits::ToPrimitive::to_i128(v),
            _ => None,
        }
    }

    fn put(self, v: i128, out: &mut Vec<u8>) {
        match (self.bits, self.signed) {
            (64, true) => out.extend_from_slice(&(v as i64).to_le_bytes()),
            (32, true) => out.extend_from_slice(&(v as i32).to_le_bytes()),
            (64, false) => out.extend_from_slice(&(v as u64).to_le_bytes()),
            _ => out.extend_from_slice(&(v as u32).to_le_bytes()),
        }
    }
}

impl ColumnCodec for FixedInt {
    fn supports_null(&self) -> bool {
        self.signed
    }

    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        // Bits columns take integers only; signed columns also take integral floats.
        let v = integer_input(ty, value, self.signed)?;
        let (lo, hi) = self.range();
        if v < lo || v > hi {
            return Err(DsutilError::range(
                ty,
                format!("{v} outside {lo}..={hi}"),
            ));
        }
        Ok(match i64::try_from(v) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::from(v as u64),
        })
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::None if self.signed => self.put(self.null_sentinel(), out),
            other => match Self::as_i128(other) {
                Some(v) => self.put(v, out),
                None => return Err(mismatched(other)),
            },
        }
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        Ok(match (self.bits, self.signed) {
            (64, true) => match i64::from_le_bytes(input.read_array()?) {
                i64::MIN => Value::None,
                v => Value::Int(v),
            },
            (32, true) => match i32::from_le_bytes(input.read_array()?) {
                i32::MIN => Value::None,
                v => Value::Int(v.into()),
            },
            (64, false) => Value::from(u64::from_le_bytes(input.read_array()?)),
            _ => Value::Int(u32::from_le_bytes(input.read_array()?).into()),
        })
    }

    fn hash(&self, value: &Value) -> u64 {
        match Self::as_i128(value) {
            Some(v) if self.signed => hash_i64(v as i64),
            Some(v) => hash_u64(v as u64),
            None => 0,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        Some(Self::as_i128(a)?.cmp(&Self::as_i128(b)?))
    }
}
