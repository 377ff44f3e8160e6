use std::fmt;
use std::ops::ControlFlow;

use serde::{Deserialize, Deserializer};

use crate::compression::DEFAULT_COMPRESSION;
use crate::error::{BoxError, DsutilError, Result};
use crate::partition::HashPartition;
use crate::value::Value;

/// Progress callback of a reader. It receives the number of values produced so far plus the
/// configured offset; `Break` ends the read early without an error.
pub type Callback = Box<dyn FnMut(i64) -> std::result::Result<ControlFlow<()>, BoxError> + Send>;

fn default_compression() -> String {
    DEFAULT_COMPRESSION.to_owned()
}

fn default_interval() -> u64 {
    1
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriterOptions {
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default)]
    pub none_support: bool,
    /// Substituted for values the column rejects. `Some(Value::None)` is a valid default when
    /// `none_support` is set.
    #[serde(default, deserialize_with = "present_value")]
    pub default: Option<Value>,
    #[serde(default)]
    pub hash_partition: Option<HashPartition>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            none_support: false,
            default: None,
            hash_partition: None,
        }
    }
}

impl WriterOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| DsutilError::config(format!("invalid writer options: {err}")))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderOptions {
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default)]
    pub hash_partition: Option<HashPartition>,
    /// Stop after this many values. JSON `-1` means unbounded.
    #[serde(default, deserialize_with = "want_count")]
    pub want_count: Option<u64>,
    #[serde(skip)]
    pub callback: Option<Callback>,
    #[serde(default = "default_interval")]
    pub callback_interval: u64,
    #[serde(default)]
    pub callback_offset: i64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            hash_partition: None,
            want_count: None,
            callback: None,
            callback_interval: default_interval(),
            callback_offset: 0,
        }
    }
}

impl ReaderOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| DsutilError::config(format!("invalid reader options: {err}")))
    }

    pub fn with_callback<F>(mut self, interval: u64, offset: i64, callback: F) -> Self
    where
        F: FnMut(i64) -> std::result::Result<ControlFlow<()>, BoxError> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self.callback_interval = interval;
        self.callback_offset = offset;
        self
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("compression", &self.compression)
            .field("hash_partition", &self.hash_partition)
            .field("want_count", &self.want_count)
            .field("callback", &self.callback.as_ref().map(|_| ".."))
            .field("callback_interval", &self.callback_interval)
            .field("callback_offset", &self.callback_offset)
            .finish()
    }
}

/// A present JSON value, including `null`, is `Some`; only an absent field is `None`.
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let json = serde_json::Value::deserialize(deserializer)?;
    value_from_json(json).map(Some).map_err(serde::de::Error::custom)
}

fn value_from_json(json: serde_json::Value) -> std::result::Result<Value, String> {
    Ok(match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Value::Int(v)
            } else if let Some(v) = n.as_u64() {
                Value::from(v)
            } else if let Some(v) = n.as_f64() {
                Value::Float(v)
            } else {
                return Err(format!("unsupported number {n}"));
            }
        }
        serde_json::Value::String(s) => Value::Text(s),
        other => return Err(format!("default must be a scalar, not {other}")),
    })
}

fn want_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match i64::deserialize(deserializer)? {
        -1 => Ok(None),
        n => u64::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("want_count {n} must be -1 or >= 0"))),
    }
}
