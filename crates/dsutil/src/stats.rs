use std::cmp::Ordering;

use serde::Serialize;

use crate::codecs::ColumnCodec;
use crate::types::ValueType;
use crate::value::Value;

/// Summary of a closed writer session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    pub value_type: ValueType,
    pub compression: String,
    /// Values persisted (after partition filtering).
    pub count: u64,
    /// Writes that fell back to the configured default.
    pub default_count: u64,
    /// Smallest persisted non-None value; always `None` for unordered domains.
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub blocks: u64,
    pub raw_bytes: u64,
    pub stored_bytes: u64,
}

/// Running min/max over the stored form of persisted values.
#[derive(Clone, Debug, Default)]
pub(crate) struct MinMax {
    min: Option<Value>,
    max: Option<Value>,
}

impl MinMax {
    pub(crate) fn update(&mut self, codec: &dyn ColumnCodec, value: &Value) {
        if value.is_none() || !codec.supports_order() {
            return;
        }
        // NaN is unordered against everything and never becomes min or max.
        if codec.compare(value, value) != Some(Ordering::Equal) {
            return;
        }
        if self
            .min
            .as_ref()
            .map_or(true, |m| codec.compare(value, m) == Some(Ordering::Less))
        {
            self.min = Some(value.clone());
        }
        if self
            .max
            .as_ref()
            .map_or(true, |m| codec.compare(value, m) == Some(Ordering::Greater))
        {
            self.max = Some(value.clone());
        }
    }

    pub(crate) fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub(crate) fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Option<Value>, Option<Value>) {
        (self.min, self.max)
    }
}
