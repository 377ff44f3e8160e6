//! Parsing adapters for the `Parsed*` domains.
//!
//! Text input is trimmed and parsed with the grammar of the base domain; the result is then
//! validated by the base domain like any other value.

use std::str::FromStr;

use num_bigint::BigInt;

use crate::error::{DsutilError, Result};
use crate::types::ValueType;
use crate::value::Value;

/// Convert `value` to what the base domain of `ty` should validate, or `None` to hand the value
/// over unchanged.
pub(crate) fn parse_text(ty: ValueType, value: &Value) -> Result<Option<Value>> {
    let base = ty.base();
    let text = match value {
        Value::Text(s) => s.as_str(),
        Value::Bytes(b) => std::str::from_utf8(b).map_err(|_| parse_error(ty, value))?,
        Value::Float(f) if is_fixed_int(base) => return truncate(ty, *f).map(Some),
        _ => return Ok(None),
    };
    let text = text.trim();
    let parsed = match base {
        ValueType::Float64 | ValueType::Float32 => parse_float(text).map(Value::Float),
        ValueType::Number => parse_int(text).or_else(|| parse_float(text).map(Value::Float)),
        _ => parse_int(text),
    };
    parsed.map(Some).ok_or_else(|| parse_error(ty, value))
}

fn is_fixed_int(base: ValueType) -> bool {
    matches!(
        base,
        ValueType::Int64 | ValueType::Int32 | ValueType::Bits64 | ValueType::Bits32
    )
}

/// Floats written to integer domains are truncated toward zero.
fn truncate(ty: ValueType, f: f64) -> Result<Value> {
    if f.is_nan() {
        return Err(DsutilError::domain(ty, "cannot convert NaN to an integer"));
    }
    crate::codecs::bigint_from_integral_f64(f.trunc())
        .map(Value::integer)
        .ok_or_else(|| DsutilError::range(ty, format!("{f} is not finite")))
}

/// Optional sign followed by one or more ASCII digits.
fn parse_int(text: &str) -> Option<Value> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match i64::from_str(text) {
        Ok(v) => Some(Value::Int(v)),
        Err(_) => BigInt::from_str(text).ok().map(Value::integer),
    }
}

/// Decimal or scientific notation, plus `inf`/`infinity`/`nan` in any case.
fn parse_float(text: &str) -> Option<f64> {
    f64::from_str(text).ok()
}

fn parse_error(ty: ValueType, value: &Value) -> DsutilError {
    DsutilError::Parse {
        value_type: ty,
        input: match value {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        },
    }
}
