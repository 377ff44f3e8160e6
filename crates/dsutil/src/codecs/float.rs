//! `Float64`/`Float32` and `Complex64`/`Complex32` columns.
//!
//! None is stored as a reserved signalling-NaN bit pattern. Every NaN written as data is
//! canonicalized to the quiet NaN first, so the reserved pattern never occurs as a value.

use std::cmp::Ordering;

use num_complex::Complex64;
use num_traits::ToPrimitive;

use super::{mismatched, unexpected, ColumnCodec};
use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::hash::{hash_complex, hash_f64};
use crate::types::ValueType;
use crate::value::Value;

const NULL_F64: u64 = 0x7ff4_0000_0000_0000;
const NULL_F32: u32 = 0x7fa0_0000;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Float {
    pub bits: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Complex {
    pub bits: u32,
}

/// Real-valued view of a numeric input.
fn real_input(ty: ValueType, value: &Value) -> Result<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(v) => Ok(*v as f64),
        Value::Bool(b) => Ok(f64::from(u8::from(*b))),
        Value::BigInt(v) => match v.to_f64() {
            Some(f) if f.is_finite() => Ok(f),
            _ => Err(DsutilError::range(ty, format!("{v} is too large for a float"))),
        },
        other => Err(unexpected(ty, other)),
    }
}

fn narrow(bits: u32, f: f64) -> f64 {
    if bits == 32 {
        f64::from(f as f32)
    } else {
        f
    }
}

/// Every NaN is stored as the quiet positive NaN, so validate it that way too.
fn canonical_nan(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else {
        f
    }
}

fn put(bits: u32, f: Option<f64>, out: &mut Vec<u8>) {
    match (bits, f) {
        (32, None) => out.extend_from_slice(&NULL_F32.to_le_bytes()),
        (32, Some(f)) if f.is_nan() => out.extend_from_slice(&f32::NAN.to_bits().to_le_bytes()),
        (32, Some(f)) => out.extend_from_slice(&(f as f32).to_bits().to_le_bytes()),
        (_, None) => out.extend_from_slice(&NULL_F64.to_le_bytes()),
        (_, Some(f)) if f.is_nan() => out.extend_from_slice(&f64::NAN.to_bits().to_le_bytes()),
        (_, Some(f)) => out.extend_from_slice(&f.to_bits().to_le_bytes()),
    }
}

fn take(bits: u32, input: &mut BlockReader) -> Result<Option<f64>> {
    if bits == 32 {
        let raw = u32::from_le_bytes(input.read_array()?);
        Ok((raw != NULL_F32).then(|| f64::from(f32::from_bits(raw))))
    } else {
        let raw = u64::from_le_bytes(input.read_array()?);
        Ok((raw != NULL_F64).then(|| f64::from_bits(raw)))
    }
}

impl ColumnCodec for Float {
    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        Ok(Value::Float(canonical_nan(narrow(self.bits, real_input(ty, value)?))))
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::None => put(self.bits, None, out),
            Value::Float(f) => put(self.bits, Some(*f), out),
            other => return Err(mismatched(other)),
        }
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        Ok(take(self.bits, input)?.map_or(Value::None, Value::Float))
    }

    fn hash(&self, value: &Value) -> u64 {
        match value {
            Value::Float(f) => hash_f64(*f),
            _ => 0,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl ColumnCodec for Complex {
    fn supports_order(&self) -> bool {
        false
    }

    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        let c = match value {
            Value::Complex(c) => *c,
            other => Complex64::new(real_input(ty, other)?, 0.0),
        };
        Ok(Value::Complex(Complex64::new(
            canonical_nan(narrow(self.bits, c.re)),
            canonical_nan(narrow(self.bits, c.im)),
        )))
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::None => {
                put(self.bits, None, out);
                put(self.bits, None, out);
            }
            Value::Complex(c) => {
                put(self.bits, Some(c.re), out);
                put(self.bits, Some(c.im), out);
            }
            other => return Err(mismatched(other)),
        }
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        let re = take(self.bits, input)?;
        let im = take(self.bits, input)?;
        match (re, im) {
            (Some(re), Some(im)) => Ok(Value::Complex(Complex64::new(re, im))),
            (None, None) => Ok(Value::None),
            _ => Err(DsutilError::Corrupt(
                "complex value with a single null component".to_owned(),
            )),
        }
    }

    fn hash(&self, value: &Value) -> u64 {
        match value {
            Value::Complex(c) => hash_complex(*c),
            _ => 0,
        }
    }
}
