use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A wall-clock date and time with the fold bit used to tell apart the two occurrences of a
/// repeated local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateTime {
    pub naive: NaiveDateTime,
    #[serde(default)]
    pub fold: bool,
}

impl DateTime {
    pub fn new(naive: NaiveDateTime) -> Self {
        Self { naive, fold: false }
    }

    pub fn with_fold(naive: NaiveDateTime, fold: bool) -> Self {
        Self { naive, fold }
    }
}

/// A time of day with a fold bit (see [`DateTime`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub naive: NaiveTime,
    #[serde(default)]
    pub fold: bool,
}

impl Time {
    pub fn new(naive: NaiveTime) -> Self {
        Self { naive, fold: false }
    }

    pub fn with_fold(naive: NaiveTime, fold: bool) -> Self {
        Self { naive, fold }
    }
}

/// A value as handed to writers and produced by readers.
///
/// Integers that fit in `i64` are always `Int`; `BigInt` is reserved for larger magnitudes.
/// Use [`Value::integer`] (or the `From` impls) to get the normalized form.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    Complex(Complex64),
    Bytes(Vec<u8>),
    Text(String),
    DateTime(DateTime),
    Date(NaiveDate),
    Time(Time),
    /// Resolved to the current local date/time by the calendar types when written.
    Now,
}

impl Value {
    pub fn integer(v: BigInt) -> Self {
        match v.to_i64() {
            Some(small) => Value::Int(small),
            None => Value::BigInt(v),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(_) => "complex",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "str",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Now => "now",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) | (Value::Now, Value::Now) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Int(a), Value::BigInt(b)) | (Value::BigInt(b), Value::Int(a)) => {
                BigInt::from(*a) == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Complex(v) => write!(f, "({}{:+}j)", v.re, v.im),
            Value::Bytes(v) => write!(f, "b{:?}", String::from_utf8_lossy(v)),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::DateTime(v) => write!(f, "{}", v.naive),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{}", v.naive),
            Value::Now => f.write_str("now"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::BigInt(v.into()),
        }
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Complex64> for Value {
    fn from(v: Complex64) -> Self {
        Value::Complex(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime> for Value {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(DateTime::new(v))
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Time> for Value {
    fn from(v: Time) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(Time::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}
