use std::iter::FusedIterator;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::block::BlockReader;
use crate::codecs::ColumnCodec;
use crate::compression::CompressionRegistry;
use crate::error::{DsutilError, Result};
use crate::options::{Callback, ReaderOptions};
use crate::partition::{HashPartition, PartitionFilter};
use crate::types::ValueType;
use crate::value::Value;

/// Lazily decodes a column file written by a [`crate::TypedWriter`] of the same domain.
///
/// Iteration yields `Result<Value>`; after the first error (or the end of the selection) the
/// iterator is exhausted. A `Parsed*` domain reads like its base domain.
pub struct TypedReader {
    path: PathBuf,
    value_type: ValueType,
    codec: &'static dyn ColumnCodec,
    compression: String,
    input: BlockReader,
    filter: PartitionFilter,
    want_count: Option<u64>,
    callback: Option<Callback>,
    callback_interval: u64,
    callback_offset: i64,
    next_callback: u64,
    produced: u64,
    done: bool,
}

impl TypedReader {
    pub fn open(path: impl AsRef<Path>, value_type: ValueType, options: ReaderOptions) -> Result<Self> {
        Self::open_with_registry(path, value_type, options, &CompressionRegistry::default())
    }

    pub fn open_with_registry(
        path: impl AsRef<Path>,
        value_type: ValueType,
        options: ReaderOptions,
        registry: &CompressionRegistry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let ReaderOptions {
            compression,
            hash_partition,
            want_count,
            callback,
            callback_interval,
            callback_offset,
        } = options;
        if callback_interval == 0 {
            return Err(DsutilError::config("callback_interval must be positive"));
        }
        let filter = PartitionFilter::new(hash_partition)?;
        let codec = registry.get(&compression)?;
        let input = BlockReader::open(path, codec)?;
        let value_type = value_type.base();

        log::debug!(
            "opened {value_type} reader for {} (compression {compression}, partition {:?}, want_count {want_count:?})",
            path.display(),
            filter.partition()
        );
        Ok(Self {
            path: path.to_path_buf(),
            value_type,
            codec: value_type.codec(),
            compression,
            input,
            filter,
            want_count,
            callback,
            callback_interval,
            callback_offset,
            next_callback: callback_interval,
            produced: 0,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn compression(&self) -> &str {
        &self.compression
    }

    pub fn hash_partition(&self) -> Option<&HashPartition> {
        self.filter.partition()
    }

    /// Values produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Per record of the whole file, whether it belongs to the configured hash partition.
    ///
    /// Columns of the same dataset line up by position, so this selects the same rows from a
    /// sibling column read without a partition.
    pub fn membership(self) -> Result<Membership> {
        if self.filter.partition().is_none() {
            return Err(DsutilError::config("membership needs a hash_partition"));
        }
        Ok(Membership {
            reader: self,
            done: false,
        })
    }

    fn run_callback(&mut self) -> Option<Result<Value>> {
        let callback = self.callback.as_mut()?;
        if self.produced < self.next_callback {
            return None;
        }
        self.next_callback += self.callback_interval;
        let position = i64::try_from(self.produced)
            .unwrap_or(i64::MAX)
            .saturating_add(self.callback_offset);
        match callback(position) {
            Ok(ControlFlow::Continue(())) => None,
            Ok(ControlFlow::Break(())) => {
                log::debug!("callback stopped {} after {} values", self.path.display(), self.produced);
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(DsutilError::Callback(err)))
            }
        }
    }

    fn decode_next(&mut self) -> Result<Option<Value>> {
        if self.input.at_end()? {
            return Ok(None);
        }
        self.codec.decode(&mut self.input).map(Some)
    }
}

impl Iterator for TypedReader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.want_count.is_some_and(|want| self.produced >= want) {
            self.done = true;
            return None;
        }
        if let Some(failed) = self.run_callback() {
            return Some(failed);
        }
        if self.done {
            return None;
        }
        loop {
            match self.decode_next() {
                Ok(Some(value)) => {
                    let hash = self.codec.hash(&value);
                    if self.filter.admit(hash, value.is_none()) {
                        self.produced += 1;
                        return Some(Ok(value));
                    }
                }
                Ok(None) => {
                    log::debug!(
                        "finished {} reader for {}: {} values from {} blocks",
                        self.value_type,
                        self.path.display(),
                        self.produced,
                        self.input.blocks_read()
                    );
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl FusedIterator for TypedReader {}

impl std::fmt::Debug for TypedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedReader")
            .field("path", &self.path)
            .field("value_type", &self.value_type)
            .field("compression", &self.compression)
            .field("produced", &self.produced)
            .finish_non_exhaustive()
    }
}

/// See [`TypedReader::membership`].
#[derive(Debug)]
pub struct Membership {
    reader: TypedReader,
    done: bool,
}

impl Iterator for Membership {
    type Item = Result<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let reader = &mut self.reader;
        match reader.decode_next() {
            Ok(Some(value)) => {
                let hash = reader.codec.hash(&value);
                Some(Ok(reader.filter.admit(hash, value.is_none())))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Membership {}
