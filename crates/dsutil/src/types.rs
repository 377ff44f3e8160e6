use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codecs::{self, ColumnCodec};
use crate::error::{DsutilError, Result};
use crate::value::Value;

/// The value domains a column can be declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Float64,
    Float32,
    Int64,
    Int32,
    Bits64,
    Bits32,
    Number,
    Complex64,
    Complex32,
    Bool,
    Bytes,
    Ascii,
    Unicode,
    DateTime,
    Date,
    Time,
    ParsedFloat64,
    ParsedFloat32,
    ParsedNumber,
    ParsedInt64,
    ParsedInt32,
    ParsedBits64,
    ParsedBits32,
}

impl ValueType {
    pub const ALL: [ValueType; 23] = [
        ValueType::Float64,
        ValueType::Float32,
        ValueType::Int64,
        ValueType::Int32,
        ValueType::Bits64,
        ValueType::Bits32,
        ValueType::Number,
        ValueType::Complex64,
        ValueType::Complex32,
        ValueType::Bool,
        ValueType::Bytes,
        ValueType::Ascii,
        ValueType::Unicode,
        ValueType::DateTime,
        ValueType::Date,
        ValueType::Time,
        ValueType::ParsedFloat64,
        ValueType::ParsedFloat32,
        ValueType::ParsedNumber,
        ValueType::ParsedInt64,
        ValueType::ParsedInt32,
        ValueType::ParsedBits64,
        ValueType::ParsedBits32,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Float64 => "Float64",
            ValueType::Float32 => "Float32",
            ValueType::Int64 => "Int64",
            ValueType::Int32 => "Int32",
            ValueType::Bits64 => "Bits64",
            ValueType::Bits32 => "Bits32",
            ValueType::Number => "Number",
            ValueType::Complex64 => "Complex64",
            ValueType::Complex32 => "Complex32",
            ValueType::Bool => "Bool",
            ValueType::Bytes => "Bytes",
            ValueType::Ascii => "Ascii",
            ValueType::Unicode => "Unicode",
            ValueType::DateTime => "DateTime",
            ValueType::Date => "Date",
            ValueType::Time => "Time",
            ValueType::ParsedFloat64 => "ParsedFloat64",
            ValueType::ParsedFloat32 => "ParsedFloat32",
            ValueType::ParsedNumber => "ParsedNumber",
            ValueType::ParsedInt64 => "ParsedInt64",
            ValueType::ParsedInt32 => "ParsedInt32",
            ValueType::ParsedBits64 => "ParsedBits64",
            ValueType::ParsedBits32 => "ParsedBits32",
        }
    }

    /// The domain whose storage format this domain shares. Parsed domains are read back with
    /// the reader of their base domain.
    pub fn base(self) -> ValueType {
        match self {
            ValueType::ParsedFloat64 => ValueType::Float64,
            ValueType::ParsedFloat32 => ValueType::Float32,
            ValueType::ParsedNumber => ValueType::Number,
            ValueType::ParsedInt64 => ValueType::Int64,
            ValueType::ParsedInt32 => ValueType::Int32,
            ValueType::ParsedBits64 => ValueType::Bits64,
            ValueType::ParsedBits32 => ValueType::Bits32,
            other => other,
        }
    }

    pub fn is_parsed(self) -> bool {
        self.base() != self
    }

    pub fn supports_null(self) -> bool {
        self.codec().supports_null()
    }

    pub fn supports_order(self) -> bool {
        self.codec().supports_order()
    }

    pub(crate) fn codec(self) -> &'static dyn ColumnCodec {
        codecs::lookup(self.base())
    }

    /// Coerce `value` into the stored form for this domain.
    ///
    /// `none_support` decides whether `Value::None` is accepted. The returned value is exactly
    /// what a reader will produce for it.
    pub fn validate(self, value: &Value, none_support: bool) -> Result<Value> {
        if value.is_none() {
            return if none_support && self.supports_null() {
                Ok(Value::None)
            } else {
                Err(DsutilError::NullNotSupported { value_type: self })
            };
        }
        if self.is_parsed() {
            if let Some(parsed) = crate::parsed::parse_text(self, value)? {
                return self.codec().validate(self, &parsed);
            }
        }
        self.codec().validate(self, value)
    }

    /// The partition hash of `value` as stored in this domain.
    ///
    /// The value is validated first (so e.g. `Ascii` rejects non-ASCII input); `None` hashes to
    /// 0 for every domain that can store it.
    pub fn hash(self, value: &Value) -> Result<u64> {
        let stored = self.validate(value, true)?;
        Ok(self.codec().hash(&stored))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = DsutilError;

    /// Accepts both `ParsedInt32` and the dataset spelling `parsed:int32`, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        ValueType::ALL
            .into_iter()
            .find(|t| t.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| DsutilError::config(format!("unknown value type {s:?}")))
    }
}

impl TryFrom<String> for ValueType {
    type Error = DsutilError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ValueType> for String {
    fn from(t: ValueType) -> Self {
        t.name().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_in_both_spellings() {
        for t in ValueType::ALL {
            assert_eq!(t.name().parse::<ValueType>().unwrap(), t);
            assert_eq!(t.name().to_lowercase().parse::<ValueType>().unwrap(), t);
        }
        assert_eq!(
            "parsed:int32".parse::<ValueType>().unwrap(),
            ValueType::ParsedInt32
        );
        assert_eq!("datetime".parse::<ValueType>().unwrap(), ValueType::DateTime);
        assert!(matches!(
            "int128".parse::<ValueType>(),
            Err(DsutilError::Configuration(_))
        ));
    }

    #[test]
    fn parsed_types_share_base_capabilities() {
        assert_eq!(ValueType::ParsedBits32.base(), ValueType::Bits32);
        assert!(!ValueType::ParsedBits64.supports_null());
        assert!(ValueType::ParsedNumber.supports_order());
        assert!(!ValueType::Complex32.supports_order());
        assert!(!ValueType::Unicode.supports_order());
        assert!(ValueType::Bool.supports_order());
    }
}
