use std::path::{Path, PathBuf};

use crate::block::BlockWriter;
use crate::codecs::ColumnCodec;
use crate::compression::CompressionRegistry;
use crate::error::{DsutilError, Result};
use crate::options::WriterOptions;
use crate::partition::{HashPartition, PartitionFilter};
use crate::stats::{ColumnStats, MinMax};
use crate::types::ValueType;
use crate::value::Value;

/// Writes one column file of a single [`ValueType`].
///
/// The file is staged next to its destination and only appears there on [`TypedWriter::close`].
/// Dropping a writer without closing it discards everything written.
pub struct TypedWriter {
    path: PathBuf,
    value_type: ValueType,
    codec: &'static dyn ColumnCodec,
    compression: String,
    none_support: bool,
    default: Option<Value>,
    filter: PartitionFilter,
    out: BlockWriter,
    item: Vec<u8>,
    count: u64,
    default_count: u64,
    minmax: MinMax,
}

impl TypedWriter {
    pub fn open(path: impl AsRef<Path>, value_type: ValueType, options: WriterOptions) -> Result<Self> {
        Self::open_with_registry(path, value_type, options, &CompressionRegistry::default())
    }

    pub fn open_with_registry(
        path: impl AsRef<Path>,
        value_type: ValueType,
        options: WriterOptions,
        registry: &CompressionRegistry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let WriterOptions {
            compression,
            none_support,
            default,
            hash_partition,
        } = options;

        if none_support && !value_type.supports_null() {
            return Err(DsutilError::config(format!(
                "{value_type} columns cannot store None"
            )));
        }
        let default = default
            .map(|d| {
                value_type.validate(&d, none_support).map_err(|err| {
                    DsutilError::config(format!("invalid default {d} for {value_type}: {err}"))
                })
            })
            .transpose()?;
        let filter = PartitionFilter::new(hash_partition)?;
        let codec = registry.get(&compression)?;
        let out = BlockWriter::create(path, codec)?;

        log::debug!(
            "opened {value_type} writer for {} (compression {compression}, none_support {none_support}, partition {:?})",
            path.display(),
            filter.partition()
        );
        Ok(Self {
            path: path.to_path_buf(),
            value_type,
            codec: value_type.codec(),
            compression,
            none_support,
            default,
            filter,
            out,
            item: Vec::new(),
            count: 0,
            default_count: 0,
            minmax: MinMax::default(),
        })
    }

    /// Validate `value`, falling back to the default for rejected values.
    fn resolve(&self, value: &Value) -> Result<(Value, bool)> {
        match self.value_type.validate(value, self.none_support) {
            Ok(stored) => Ok((stored, false)),
            Err(err) if err.is_value_error() => match &self.default {
                Some(default) => Ok((default.clone(), true)),
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Write one value. Returns whether it was persisted, i.e. not filtered out by the hash
    /// partition.
    ///
    /// A rejected value (without a default to fall back to) fails only this call; the writer
    /// stays usable.
    pub fn write(&mut self, value: impl Into<Value>) -> Result<bool> {
        let (stored, used_default) = self.resolve(&value.into())?;
        if used_default {
            self.default_count += 1;
        }
        let hash = self.codec.hash(&stored);
        if !self.filter.admit(hash, stored.is_none()) {
            return Ok(false);
        }
        self.item.clear();
        self.codec.encode(&stored, &mut self.item)?;
        self.out.append(&self.item)?;
        self.count += 1;
        self.minmax.update(self.codec, &stored);
        Ok(true)
    }

    /// Whether [`TypedWriter::write`] would persist `value`, without writing anything.
    pub fn hashcheck(&self, value: impl Into<Value>) -> Result<bool> {
        let (stored, _) = self.resolve(&value.into())?;
        Ok(self.filter.peek(self.codec.hash(&stored), stored.is_none()))
    }

    /// Push buffered data to the staged file. The destination still only appears on close.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()
    }

    pub fn close(self) -> Result<ColumnStats> {
        let totals = self.out.finish()?;
        log::debug!(
            "closed {} writer for {}: {} values ({} defaulted)",
            self.value_type,
            self.path.display(),
            self.count,
            self.default_count
        );
        let (min, max) = self.minmax.into_parts();
        Ok(ColumnStats {
            value_type: self.value_type,
            compression: self.compression,
            count: self.count,
            default_count: self.default_count,
            min,
            max,
            blocks: totals.blocks,
            raw_bytes: totals.raw_bytes,
            stored_bytes: totals.stored_bytes,
        })
    }

    /// Abandon the column; nothing is written to the destination.
    pub fn discard(self) -> Result<()> {
        self.out.discard()
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

    pub fn none_support(&self) -> bool {
        self.none_support
    }

    pub fn hash_partition(&self) -> Option<&HashPartition> {
        self.filter.partition()
    }

    /// Values persisted so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn default_count(&self) -> u64 {
        self.default_count
    }

    pub fn min(&self) -> Option<&Value> {
        self.minmax.min()
    }

    pub fn max(&self) -> Option<&Value> {
        self.minmax.max()
    }
}

impl std::fmt::Debug for TypedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedWriter")
            .field("path", &self.path)
            .field("value_type", &self.value_type)
            .field("compression", &self.compression)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

/// Write a whole column inside `f`.
///
/// The column is committed if `f` succeeds and discarded if it fails.
pub fn write_column<F>(
    path: impl AsRef<Path>,
    value_type: ValueType,
    options: WriterOptions,
    f: F,
) -> Result<ColumnStats>
where
    F: FnOnce(&mut TypedWriter) -> Result<()>,
{
    let mut writer = TypedWriter::open(path, value_type, options)?;
    match f(&mut writer) {
        Ok(()) => writer.close(),
        Err(err) => {
            if let Err(discard_err) = writer.discard() {
                log::warn!("failed to discard column after error: {discard_err}");
            }
            Err(err)
        }
    }
}
