//! `Number` columns: exact integers of (almost) any size and floats, mixed freely.
//!
//! Items are a tag byte followed by a payload:
//!
//! | tag           | payload                                          |
//! |---------------|--------------------------------------------------|
//! | `0x00`        | none (None)                                      |
//! | `0x01`        | f64 LE                                           |
//! | `0x02`        | i64 LE                                           |
//! | `0x80 \| len` | `len` bytes of two's complement LE, `len <= 126` |
//!
//! Large items freely straddle block boundaries; the block reader reassembles them.

use std::cmp::Ordering;

use num_bigint::BigInt;

use super::{bigint_from_integral_f64, mismatched, unexpected, ColumnCodec};
use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::hash::{hash_bigint, hash_f64, hash_i64};
use crate::types::ValueType;
use crate::value::Value;

const TAG_NONE: u8 = 0x00;
const TAG_F64: u8 = 0x01;
const TAG_I64: u8 = 0x02;
const TAG_BIG: u8 = 0x80;

/// Integers need `|v| < 2^MAX_BITS`.
const MAX_BITS: u64 = 1007;
const MAX_BIG_LEN: usize = 126;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Number;

/// Exact ordering between two numeric stored values (`Int`, `BigInt`, `Float`).
fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Float(f), other) => compare_int_float(&as_bigint(other)?, *f).map(Ordering::reverse),
        (other, Value::Float(f)) => compare_int_float(&as_bigint(other)?, *f),
        (a, b) => Some(as_bigint(a)?.cmp(&as_bigint(b)?)),
    }
}

fn as_bigint(value: &Value) -> Option<BigInt> {
    match value {
        Value::Int(v) => Some(BigInt::from(*v)),
        Value::BigInt(v) => Some(v.clone()),
        _ => None,
    }
}

/// Compare an integer with a float without rounding either.
fn compare_int_float(i: &BigInt, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.is_infinite() {
        return Some(if f > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    let floor = f.floor();
    let floor_int = bigint_from_integral_f64(floor)?;
    Some(match i.cmp(&floor_int) {
        Ordering::Equal if f > floor => Ordering::Less,
        other => other,
    })
}

impl ColumnCodec for Number {
    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        match value {
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::BigInt(v) => {
                if v.magnitude().bits() > MAX_BITS {
                    Err(DsutilError::range(
                        ty,
                        format!("integers need fewer than {} bits", MAX_BITS + 1),
                    ))
                } else {
                    Ok(Value::integer(v.clone()))
                }
            }
            Value::Float(f) if f.is_nan() => Err(DsutilError::range(ty, "NaN is not a number")),
            Value::Float(f) => Ok(Value::Float(*f)),
            other => Err(unexpected(ty, other)),
        }
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::None => out.push(TAG_NONE),
            Value::Float(f) => {
                out.push(TAG_F64);
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::Int(v) => {
                out.push(TAG_I64);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::BigInt(v) => {
                let bytes = v.to_signed_bytes_le();
                if bytes.len() > MAX_BIG_LEN {
                    return Err(mismatched(value));
                }
                out.push(TAG_BIG | bytes.len() as u8);
                out.extend_from_slice(&bytes);
            }
            other => return Err(mismatched(other)),
        }
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        match input.read_u8()? {
            TAG_NONE => Ok(Value::None),
            TAG_F64 => Ok(Value::Float(f64::from_bits(u64::from_le_bytes(
                input.read_array()?,
            )))),
            TAG_I64 => Ok(Value::Int(i64::from_le_bytes(input.read_array()?))),
            tag if tag & TAG_BIG != 0 && usize::from(tag & !TAG_BIG) <= MAX_BIG_LEN && tag != TAG_BIG => {
                let bytes = input.read_vec(usize::from(tag & !TAG_BIG))?;
                Ok(Value::integer(BigInt::from_signed_bytes_le(&bytes)))
            }
            tag => Err(DsutilError::Corrupt(format!("unknown Number tag {tag:#04x}"))),
        }
    }

    fn hash(&self, value: &Value) -> u64 {
        match value {
            Value::Int(v) => hash_i64(*v),
            Value::BigInt(v) => hash_bigint(v),
            Value::Float(f) => hash_f64(*f),
            _ => 0,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        compare_numbers(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_comparisons_are_exact() {
        let big = Value::BigInt(BigInt::from(1u8) << 70);
        assert_eq!(compare_numbers(&Value::Int(1), &Value::Float(0.5)), Some(Ordering::Greater));
        assert_eq!(compare_numbers(&Value::Float(0.5), &Value::Int(1)), Some(Ordering::Less));
        assert_eq!(compare_numbers(&Value::Int(0), &Value::Float(0.5)), Some(Ordering::Less));
        assert_eq!(compare_numbers(&Value::Int(-1), &Value::Float(-0.5)), Some(Ordering::Less));
        assert_eq!(compare_numbers(&Value::Int(5), &Value::Float(5.0)), Some(Ordering::Equal));
        assert_eq!(compare_numbers(&big, &Value::Float(1e300)), Some(Ordering::Less));
        assert_eq!(
            compare_numbers(&big, &Value::Float(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_numbers(&big, &Value::Int(i64::MAX)), Some(Ordering::Greater));
    }

    #[test]
    fn magnitude_limit() {
        let one = BigInt::from(1u8);
        let ok: BigInt = (one.clone() << 1007u32) - 1;
        let too_big = one << 1007u32;
        assert!(Number.validate(ValueType::Number, &Value::integer(ok.clone())).is_ok());
        assert!(Number.validate(ValueType::Number, &Value::integer(-ok)).is_ok());
        assert!(matches!(
            Number.validate(ValueType::Number, &Value::integer(too_big.clone())),
            Err(DsutilError::Range { .. })
        ));
        assert!(matches!(
            Number.validate(ValueType::Number, &Value::integer(-too_big)),
            Err(DsutilError::Range { .. })
        ));
    }

    #[test]
    fn largest_integer_fits_in_a_tag() {
        let ok: BigInt = (BigInt::from(1u8) << 1007u32) - 1;
        let mut out = Vec::new();
        Number.encode(&Value::integer(-ok.clone()), &mut out).unwrap();
        assert_eq!(out[0], TAG_BIG | 126);
        out.clear();
        Number.encode(&Value::integer(ok), &mut out).unwrap();
        assert_eq!(out.len(), 1 + 126);
    }
}
