use serde::{Deserialize, Serialize};

use crate::error::{DsutilError, Result};

/// Selects one slice of a column by canonical hash.
///
/// A non-None value belongs to slice `hash % slice_count`. With `spread_nulls`, the n-th None
/// (counting from 0 within a session) belongs to slice `n % slice_count` instead of hashing to
/// slice 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashPartition {
    pub slice_index: u64,
    pub slice_count: u64,
    #[serde(default)]
    pub spread_nulls: bool,
}

impl HashPartition {
    pub fn new(slice_index: u64, slice_count: u64, spread_nulls: bool) -> Result<Self> {
        let partition = Self {
            slice_index,
            slice_count,
            spread_nulls,
        };
        partition.validate()?;
        Ok(partition)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slice_count == 0 {
            return Err(DsutilError::config("hash_partition needs slice_count > 0"));
        }
        if self.slice_index >= self.slice_count {
            return Err(DsutilError::config(format!(
                "hash_partition slice_index {} is not below slice_count {}",
                self.slice_index, self.slice_count
            )));
        }
        Ok(())
    }
}

/// Session state for applying an optional [`HashPartition`] to a stream of values.
///
/// Writers and readers drive the same filter so that a reader replays exactly the null rotation
/// a writer with the same partition would have used.
#[derive(Debug, Clone, Default)]
pub(crate) struct PartitionFilter {
    partition: Option<HashPartition>,
    nulls_seen: u64,
}

impl PartitionFilter {
    pub(crate) fn new(partition: Option<HashPartition>) -> Result<Self> {
        if let Some(partition) = &partition {
            partition.validate()?;
        }
        Ok(Self {
            partition,
            nulls_seen: 0,
        })
    }

    pub(crate) fn partition(&self) -> Option<&HashPartition> {
        self.partition.as_ref()
    }

    /// Whether the next value would be admitted, without consuming a null rotation step.
    pub(crate) fn peek(&self, hash: u64, is_none: bool) -> bool {
        let Some(p) = &self.partition else {
            return true;
        };
        if is_none && p.spread_nulls {
            self.nulls_seen % p.slice_count == p.slice_index
        } else {
            hash % p.slice_count == p.slice_index
        }
    }

    /// Decide membership of the next value in the stream.
    pub(crate) fn admit(&mut self, hash: u64, is_none: bool) -> bool {
        let admitted = self.peek(hash, is_none);
        if is_none {
            self.nulls_seen += 1;
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_partitions_are_configuration_errors() {
        assert!(matches!(
            HashPartition::new(0, 0, false),
            Err(DsutilError::Configuration(_))
        ));
        assert!(matches!(
            HashPartition::new(3, 3, true),
            Err(DsutilError::Configuration(_))
        ));
        assert!(HashPartition::new(2, 3, true).is_ok());
    }

    #[test]
    fn nulls_rotate_only_when_spread() {
        let mut spread = PartitionFilter::new(Some(HashPartition::new(1, 3, true).unwrap())).unwrap();
        let admitted: Vec<bool> = (0..6).map(|_| spread.admit(0, true)).collect();
        assert_eq!(admitted, [false, true, false, false, true, false]);

        let mut hashed = PartitionFilter::new(Some(HashPartition::new(0, 3, false).unwrap())).unwrap();
        assert!((0..6).all(|_| hashed.admit(0, true)));
    }

    #[test]
    fn peek_does_not_advance_rotation() {
        let mut filter = PartitionFilter::new(Some(HashPartition::new(0, 2, true).unwrap())).unwrap();
        assert!(filter.peek(0, true));
        assert!(filter.peek(0, true));
        assert!(filter.admit(0, true));
        assert!(!filter.peek(0, true));
        assert!(filter.peek(4, false));
        assert!(!filter.peek(5, false));
    }

    #[test]
    fn deserializes_with_default_spread() {
        let p: HashPartition =
            serde_json::from_str(r#"{"slice_index": 1, "slice_count": 4}"#).unwrap();
        assert_eq!(p, HashPartition::new(1, 4, false).unwrap());
    }
}
