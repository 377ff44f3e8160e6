//! Typed columnar value codec.
//!
//! This crate focuses on:
//! - Column files of a single declared [`ValueType`], written once and read back exactly.
//! - Streaming: values pass through one 128 KiB compressed block at a time.
//! - A canonical hash that agrees across domains, used to split columns into slices.
//! - Slice filtering while writing ([`TypedWriter`]) and while reading ([`TypedReader`]).

#![forbid(unsafe_code)]

mod block;
mod codecs;
mod compression;
mod error;
mod hash;
mod options;
mod parsed;
mod partition;
mod reader;
mod stats;
mod types;
mod value;
mod writer;

pub use crate::block::{BlockReader, BlockTotals, BlockWriter, BLOCK_SIZE};
pub use crate::compression::{
    Codec, CompressionRegistry, Gzip, NoCompression, Zlib, DEFAULT_COMPRESSION,
};
pub use crate::error::{BoxError, DsutilError, Result};
pub use crate::hash::canonical_hash;
pub use crate::options::{Callback, ReaderOptions, WriterOptions};
pub use crate::partition::HashPartition;
pub use crate::reader::{Membership, TypedReader};
pub use crate::stats::ColumnStats;
pub use crate::types::ValueType;
pub use crate::value::{DateTime, Time, Value};
pub use crate::writer::{write_column, TypedWriter};
