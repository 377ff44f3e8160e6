//! Canonical partition hash.
//!
//! Values that compare equal across domains hash equal: the integer 5, the float 5.0, the
//! `Number` 5 and `true`/1 all reduce to the same canonical bytes before hashing. Falsy values
//! (None, 0, 0.0, false, empty bytes/text) hash to 0.

use std::hash::Hasher;

use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::ToPrimitive;
use siphasher::sip::SipHasher24;

use crate::codecs::{bigint_from_integral_f64, pack_date, pack_datetime, pack_time};
use crate::value::{DateTime, Time, Value};

const KEY0: u64 = 0x6473_7574_696c_2d68;
const KEY1: u64 = 0x6173_6870_6172_7431;

fn sip(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(KEY0, KEY1);
    hasher.write(bytes);
    hasher.finish()
}

pub(crate) fn hash_i64(v: i64) -> u64 {
    if v == 0 {
        0
    } else {
        sip(&v.to_le_bytes())
    }
}

/// `Bits64` values hash their raw unsigned bytes, which matches [`hash_i64`] below 2^63.
pub(crate) fn hash_u64(v: u64) -> u64 {
    if v == 0 {
        0
    } else {
        sip(&v.to_le_bytes())
    }
}

pub(crate) fn hash_bigint(v: &BigInt) -> u64 {
    match v.to_i64() {
        Some(small) => hash_i64(small),
        None => sip(&v.to_signed_bytes_le()),
    }
}

fn float_bits(v: f64) -> [u8; 8] {
    let v = if v.is_nan() { f64::NAN } else { v };
    v.to_bits().to_le_bytes()
}

pub(crate) fn hash_f64(v: f64) -> u64 {
    if v == 0.0 {
        return 0;
    }
    // Exact for every integral f64: 2^63 itself does not fit and falls through to the bigint path.
    if v.fract() == 0.0 && v >= -9_223_372_036_854_775_808.0 && v < 9_223_372_036_854_775_808.0 {
        return hash_i64(v as i64);
    }
    if let Some(big) = bigint_from_integral_f64(v) {
        return hash_bigint(&big);
    }
    sip(&float_bits(v))
}

pub(crate) fn hash_complex(v: Complex64) -> u64 {
    if v.im == 0.0 {
        return hash_f64(v.re);
    }
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&float_bits(v.re));
    bytes[8..].copy_from_slice(&float_bits(v.im));
    sip(&bytes)
}

pub(crate) fn hash_bytes(v: &[u8]) -> u64 {
    if v.is_empty() {
        0
    } else {
        sip(v)
    }
}

pub(crate) fn hash_datetime(v: &DateTime) -> u64 {
    sip(&pack_datetime(&DateTime::new(v.naive)).to_le_bytes())
}

pub(crate) fn hash_date(v: &chrono::NaiveDate) -> u64 {
    sip(&pack_date(v).to_le_bytes())
}

pub(crate) fn hash_time(v: &Time) -> u64 {
    sip(&pack_time(&Time::new(v.naive)).to_le_bytes())
}

/// Hash of a value independent of any column domain.
///
/// `Value::Now` is unresolved until a writer validates it, so it hashes to 0 here like `None`.
///
/// This is what partition assignment is based on; a writer with a hash partition accepts a value
/// iff `canonical_hash(value) % slice_count == slice_index` (for every domain except `Bits64`
/// values of 2^63 and above, which hash their raw unsigned bytes).
pub fn canonical_hash(value: &Value) -> u64 {
    match value {
        Value::None | Value::Now => 0,
        Value::Bool(false) => 0,
        Value::Bool(true) => hash_i64(1),
        Value::Int(v) => hash_i64(*v),
        Value::BigInt(v) => hash_bigint(v),
        Value::Float(v) => hash_f64(*v),
        Value::Complex(v) => hash_complex(*v),
        Value::Bytes(v) => hash_bytes(v),
        Value::Text(v) => hash_bytes(v.as_bytes()),
        Value::DateTime(v) => hash_datetime(v),
        Value::Date(v) => hash_date(v),
        Value::Time(v) => hash_time(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values_hash_to_zero() {
        for v in [
            Value::None,
            Value::Text(String::new()),
            Value::Bytes(Vec::new()),
            Value::Int(0),
            Value::Float(0.0),
            Value::Float(-0.0),
            Value::Bool(false),
            Value::Complex(Complex64::new(0.0, 0.0)),
            Value::Now,
        ] {
            assert_eq!(canonical_hash(&v), 0, "{v:?}");
        }
    }

    #[test]
    fn equal_numbers_hash_equal() {
        for v in [1i64, 2, 9_007_199_254_740_991, -42, i64::MAX] {
            let h = canonical_hash(&Value::Int(v));
            assert_ne!(h, 0);
            assert_eq!(h, canonical_hash(&Value::BigInt(BigInt::from(v))));
            assert_eq!(h, hash_bigint(&BigInt::from(v)));
            if (v as f64) as i128 == i128::from(v) {
                assert_eq!(h, canonical_hash(&Value::Float(v as f64)), "{v}");
                assert_eq!(h, hash_complex(Complex64::new(v as f64, 0.0)), "{v}");
            }
        }
        assert_eq!(canonical_hash(&Value::Bool(true)), canonical_hash(&Value::Int(1)));
    }

    #[test]
    fn large_integral_floats_hash_as_integers() {
        let f = 2f64.powi(70);
        let big = BigInt::from(1u8) << 70;
        assert_eq!(canonical_hash(&Value::Float(f)), canonical_hash(&Value::BigInt(big)));
        let edge = 9_223_372_036_854_775_808.0f64;
        assert_eq!(
            canonical_hash(&Value::Float(edge)),
            canonical_hash(&Value::from(1u64 << 63))
        );
    }

    #[test]
    fn text_and_bytes_agree_on_utf8() {
        for s in ["a", "0", "foo", "a slightly longer string", "\0", "a\0b"] {
            assert_eq!(
                canonical_hash(&Value::from(s)),
                canonical_hash(&Value::from(s.as_bytes()))
            );
        }
        // "\u{e4}" is two UTF-8 bytes, not the single latin-1 byte.
        assert_ne!(
            canonical_hash(&Value::from(&b"\xe4"[..])),
            canonical_hash(&Value::from("\u{e4}"))
        );
        // Composed and decomposed forms are different byte strings.
        assert_ne!(
            canonical_hash(&Value::from("\u{e4}")),
            canonical_hash(&Value::from("a\u{308}"))
        );
    }

    #[test]
    fn fractional_floats_hash_their_bits() {
        assert_ne!(canonical_hash(&Value::Float(0.5)), 0);
        assert_ne!(canonical_hash(&Value::Float(0.5)), canonical_hash(&Value::Float(-0.5)));
        assert_ne!(canonical_hash(&Value::Float(f64::INFINITY)), 0);
    }

    #[test]
    fn nan_sign_and_payload_do_not_change_the_hash() {
        let negative = -f64::NAN;
        let payload = f64::from_bits(0x7ff8_0000_0000_0001);
        for nan in [negative, payload] {
            assert_eq!(hash_f64(nan), hash_f64(f64::NAN));
            assert_eq!(
                hash_complex(Complex64::new(nan, 1.0)),
                hash_complex(Complex64::new(f64::NAN, 1.0))
            );
        }
    }
}
