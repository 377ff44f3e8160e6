//! `DateTime`, `Date` and `Time` columns.
//!
//! Packed layouts (least significant bits first):
//!
//! ```text
//! DateTime u64: micro:20 second:6 minute:6 hour:5 day:5 month:4 year:14 fold:1
//! Date     u32: day:5 month:4 year:14
//! Time     u64: micro:20 second:6 minute:6 hour:5 fold:1 present:1
//! ```
//!
//! Years are 1..=9999, so a packed value is never 0 and 0 marks None.

use std::cmp::Ordering;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::{mismatched, unexpected, ColumnCodec};
use crate::block::BlockReader;
use crate::error::{DsutilError, Result};
use crate::hash::{hash_date, hash_datetime, hash_time};
use crate::types::ValueType;
use crate::value::{DateTime, Time, Value};

const MICRO_BITS: u32 = 20;
const SECOND_SHIFT: u32 = MICRO_BITS;
const MINUTE_SHIFT: u32 = SECOND_SHIFT + 6;
const HOUR_SHIFT: u32 = MINUTE_SHIFT + 6;
const DAY_SHIFT: u32 = HOUR_SHIFT + 5;
const MONTH_SHIFT: u32 = DAY_SHIFT + 5;
const YEAR_SHIFT: u32 = MONTH_SHIFT + 4;
const DATETIME_FOLD_SHIFT: u32 = YEAR_SHIFT + 14;
const TIME_FOLD_SHIFT: u32 = HOUR_SHIFT + 5;
const TIME_PRESENT_SHIFT: u32 = TIME_FOLD_SHIFT + 1;

const DATE_MONTH_SHIFT: u32 = 5;
const DATE_YEAR_SHIFT: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Calendar {
    DateTime,
    Date,
    Time,
}

/// The current local time at microsecond resolution.
fn now() -> DateTime {
    let naive = Local::now().naive_local();
    let micros = naive.nanosecond() / 1_000 % 1_000_000;
    DateTime::new(naive.with_nanosecond(micros * 1_000).unwrap_or(naive))
}

fn pack_clock(t: &NaiveTime) -> u64 {
    u64::from(t.nanosecond() / 1_000)
        | u64::from(t.second()) << SECOND_SHIFT
        | u64::from(t.minute()) << MINUTE_SHIFT
        | u64::from(t.hour()) << HOUR_SHIFT
}

fn unpack_clock(v: u64) -> Option<NaiveTime> {
    let field = |shift: u32, bits: u32| ((v >> shift) & ((1 << bits) - 1)) as u32;
    NaiveTime::from_hms_micro_opt(
        field(HOUR_SHIFT, 5),
        field(MINUTE_SHIFT, 6),
        field(SECOND_SHIFT, 6),
        field(0, MICRO_BITS),
    )
}

pub(crate) fn pack_date(d: &NaiveDate) -> u32 {
    d.day() | d.month() << DATE_MONTH_SHIFT | (d.year() as u32) << DATE_YEAR_SHIFT
}

fn unpack_date(v: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        (v >> DATE_YEAR_SHIFT) as i32,
        (v >> DATE_MONTH_SHIFT) & 0xf,
        v & 0x1f,
    )
}

pub(crate) fn pack_datetime(dt: &DateTime) -> u64 {
    let date = dt.naive.date();
    pack_clock(&dt.naive.time())
        | u64::from(date.day()) << DAY_SHIFT
        | u64::from(date.month()) << MONTH_SHIFT
        | (date.year() as u64) << YEAR_SHIFT
        | u64::from(dt.fold) << DATETIME_FOLD_SHIFT
}

fn unpack_datetime(v: u64) -> Option<DateTime> {
    let date = NaiveDate::from_ymd_opt(
        ((v >> YEAR_SHIFT) & 0x3fff) as i32,
        ((v >> MONTH_SHIFT) & 0xf) as u32,
        ((v >> DAY_SHIFT) & 0x1f) as u32,
    )?;
    let time = unpack_clock(v)?;
    Some(DateTime::with_fold(
        NaiveDateTime::new(date, time),
        (v >> DATETIME_FOLD_SHIFT) & 1 == 1,
    ))
}

pub(crate) fn pack_time(t: &Time) -> u64 {
    pack_clock(&t.naive) | u64::from(t.fold) << TIME_FOLD_SHIFT | 1 << TIME_PRESENT_SHIFT
}

fn unpack_time(v: u64) -> Option<Time> {
    if (v >> TIME_PRESENT_SHIFT) != 1 {
        return None;
    }
    Some(Time::with_fold(unpack_clock(v)?, (v >> TIME_FOLD_SHIFT) & 1 == 1))
}

fn check_clock(ty: ValueType, t: &NaiveTime) -> Result<()> {
    let nanos = t.nanosecond();
    if nanos >= 1_000_000_000 {
        return Err(DsutilError::range(ty, "leap seconds are not representable"));
    }
    if nanos % 1_000 != 0 {
        return Err(DsutilError::range(
            ty,
            format!("{t} is finer than microsecond resolution"),
        ));
    }
    Ok(())
}

fn check_year(ty: ValueType, d: &NaiveDate) -> Result<()> {
    if (1..=9999).contains(&d.year()) {
        Ok(())
    } else {
        Err(DsutilError::range(ty, format!("year {} outside 1..=9999", d.year())))
    }
}

impl Calendar {
    fn corrupt(self, packed: u64) -> DsutilError {
        DsutilError::Corrupt(format!("invalid packed {self:?} value {packed:#x}"))
    }
}

impl ColumnCodec for Calendar {
    fn validate(&self, ty: ValueType, value: &Value) -> Result<Value> {
        match (self, value) {
            (Calendar::DateTime, Value::DateTime(dt)) => {
                check_year(ty, &dt.naive.date())?;
                check_clock(ty, &dt.naive.time())?;
                Ok(Value::DateTime(*dt))
            }
            (Calendar::DateTime, Value::Now) => Ok(Value::DateTime(now())),
            (Calendar::Date, Value::Date(d)) => {
                check_year(ty, d)?;
                Ok(Value::Date(*d))
            }
            (Calendar::Date, Value::DateTime(dt)) => {
                check_year(ty, &dt.naive.date())?;
                Ok(Value::Date(dt.naive.date()))
            }
            (Calendar::Date, Value::Now) => Ok(Value::Date(now().naive.date())),
            (Calendar::Time, Value::Time(t)) => {
                check_clock(ty, &t.naive)?;
                Ok(Value::Time(*t))
            }
            (Calendar::Time, Value::Now) => Ok(Value::Time(Time::new(now().naive.time()))),
            (_, other) => Err(unexpected(ty, other)),
        }
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match (self, value) {
            (Calendar::DateTime | Calendar::Time, Value::None) => {
                out.extend_from_slice(&0u64.to_le_bytes())
            }
            (Calendar::Date, Value::None) => out.extend_from_slice(&0u32.to_le_bytes()),
            (Calendar::DateTime, Value::DateTime(dt)) => {
                out.extend_from_slice(&pack_datetime(dt).to_le_bytes())
            }
            (Calendar::Date, Value::Date(d)) => out.extend_from_slice(&pack_date(d).to_le_bytes()),
            (Calendar::Time, Value::Time(t)) => out.extend_from_slice(&pack_time(t).to_le_bytes()),
            (_, other) => return Err(mismatched(other)),
        }
        Ok(())
    }

    fn decode(&self, input: &mut BlockReader) -> Result<Value> {
        match self {
            Calendar::Date => {
                let packed = u32::from_le_bytes(input.read_array()?);
                if packed == 0 {
                    return Ok(Value::None);
                }
                unpack_date(packed)
                    .map(Value::Date)
                    .ok_or_else(|| self.corrupt(packed.into()))
            }
            Calendar::DateTime | Calendar::Time => {
                let packed = u64::from_le_bytes(input.read_array()?);
                if packed == 0 {
                    return Ok(Value::None);
                }
                let value = match self {
                    Calendar::DateTime => unpack_datetime(packed).map(Value::DateTime),
                    _ => unpack_time(packed).map(Value::Time),
                };
                value.ok_or_else(|| self.corrupt(packed))
            }
        }
    }

    fn hash(&self, value: &Value) -> u64 {
        match value {
            Value::DateTime(dt) => hash_datetime(dt),
            Value::Date(d) => hash_date(d),
            Value::Time(t) => hash_time(t),
            _ => 0,
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.naive.cmp(&b.naive)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.naive.cmp(&b.naive)),
            _ => None,
        }
    }
}
