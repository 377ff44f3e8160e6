//! Per-domain item codecs.
//!
//! Every value domain implements [`ColumnCodec`] on its own; there is no shared base beyond the
//! block stream. [`lookup`] maps a (base) [`ValueType`] to its codec.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::types::ValueType;
use crate::value::Value;

mod boolean;
mod calendar;
mod float;
mod int;
mod number;
mod strings;

pub(crate) use calendar::{pack_date, pack_datetime, pack_time};

pub(crate) trait ColumnCodec: Sync {
    fn supports_null(&self) -> bool {
        true
    }

    fn supports_order(&self) -> bool {
        true
    }

    /// Coerce a non-`None` input into its stored form.
    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value>;

    /// Append the encoding of a stored value (possibly `None`).
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()>;

    fn decode(&self, input: &mut BlockReader) -> Result<Value>;

    /// Partition hash of a stored value; agrees with [`crate::canonical_hash`].
    fn hash(&self, value: &Value) -> u64;

    /// Ordering between two non-`None` stored values, for min/max tracking.
    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        let _ = (a, b);
        None
    }
}

static FLOAT64: float::Float = float::Float { bits: 64 };
static FLOAT32: float::Float = float::Float { bits: 32 };
static COMPLEX64: float::Complex = float::Complex { bits: 64 };
static COMPLEX32: float::Complex = float::Complex { bits: 32 };
static INT64: int::FixedInt = int::FixedInt { bits: 64, signed: true };
static INT32: int::FixedInt = int::FixedInt { bits: 32, signed: true };
static BITS64: int::FixedInt = int::FixedInt { bits: 64, signed: false };
static BITS32: int::FixedInt = int::FixedInt { bits: 32, signed: false };
static NUMBER: number::Number = number::Number;
static BOOL: boolean::Bool = boolean::Bool;
static BYTES: strings::Strings = strings::Strings::Bytes;
static ASCII: strings::Strings = strings::Strings::Ascii;
static UNICODE: strings::Strings = strings::Strings::Unicode;
static DATETIME: calendar::Calendar = calendar::Calendar::DateTime;
static DATE: calendar::Calendar = calendar::Calendar::Date;
static TIME: calendar::Calendar = calendar::Calendar::Time;

pub(crate) fn lookup(ty: ValueType) -> &'static dyn ColumnCodec {
    match ty.base() {
        ValueType::Float64 => &FLOAT64,
        ValueType::Float32 => &FLOAT32,
        ValueType::Int64 => &INT64,
        ValueType::Int32 => &INT32,
        ValueType::Bits64 => &BITS64,
        ValueType::Bits32 => &BITS32,
        ValueType::Number => &NUMBER,
        ValueType::Complex64 => &COMPLEX64,
        ValueType::Complex32 => &COMPLEX32,
        ValueType::Bool => &BOOL,
        ValueType::Bytes => &BYTES,
        ValueType::Ascii => &ASCII,
        ValueType::Unicode => &UNICODE,
        ValueType::DateTime => &DATETIME,
        ValueType::Date => &DATE,
        ValueType::Time => &TIME,
        parsed => unreachable!("{parsed} has no base domain"),
    }
}

/// Integer view of a numeric input.
///
/// `Bool` counts as 0/1. Floats are accepted only when `allow_float` is set and the value is
/// integral.
pub(crate) fn integer_input(ty: ValueType, value: &Value, allow_float: bool) -> Result<i128> {
    match value {
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Int(v) => Ok(i128::from(*v)),
        Value::BigInt(v) => v
            .to_i128()
            .ok_or_else(|| DsutilError::range(ty, format!("{v} does not fit"))),
        Value::Float(f) if allow_float => {
            if !f.is_finite() {
                Err(DsutilError::range(ty, format!("{f} is not finite")))
            } else if f.fract() != 0.0 {
                Err(DsutilError::domain(ty, format!("{f} is not integral")))
            } else {
                bigint_from_integral_f64(*f)
                    .and_then(|v| v.to_i128())
                    .ok_or_else(|| DsutilError::range(ty, format!("{f} does not fit")))
            }
        }
        other => Err(unexpected(ty, other)),
    }
}

pub(crate) fn unexpected(ty: ValueType, value: &Value) -> DsutilError {
    DsutilError::domain(ty, format!("cannot store a {} value", value.kind()))
}

pub(crate) fn mismatched(value: &Value) -> DsutilError {
    DsutilError::Corrupt(format!("stored value {value} does not match the column codec"))
}

/// The integer equal to an integral, finite `f`.
pub(crate) fn bigint_from_integral_f64(f: f64) -> Option<BigInt> {
    if f.is_finite() && f.fract() == 0.0 {
        BigInt::from_f64(f)
    } else {
        None
    }
}
