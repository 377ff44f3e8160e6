//! Named compression schemes applied to each block of a column file.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{DsutilError, Result};

/// Scheme used when options don't name one.
pub const DEFAULT_COMPRESSION: &str = "gzip";

/// A block compressor. Implementations must be deterministic and lossless; each call sees one
/// whole block.
pub trait Codec: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> io::Result<()>;

    /// Decompress `data` into `out`. `raw_len` is the uncompressed size recorded in the block
    /// header and can be used as a capacity hint.
    fn decompress(&self, data: &[u8], raw_len: usize, out: &mut Vec<u8>) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompression;

impl Codec for NoCompression {
    fn name(&self) -> &str {
        "none"
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(raw);
        Ok(())
    }

    fn decompress(&self, data: &[u8], _raw_len: usize, out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(data);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    pub level: u32,
}

impl Default for Gzip {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Codec for Gzip {
    fn name(&self) -> &str {
        "gzip"
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        let mut encoder = GzEncoder::new(out, Compression::new(self.level));
        encoder.write_all(raw)?;
        encoder.finish()?;
        Ok(())
    }

    fn decompress(&self, data: &[u8], raw_len: usize, out: &mut Vec<u8>) -> io::Result<()> {
        out.reserve(raw_len);
        GzDecoder::new(data).read_to_end(out)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    pub level: u32,
}

impl Default for Zlib {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Codec for Zlib {
    fn name(&self) -> &str {
        "zlib"
    }

    fn compress(&self, raw: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        let mut encoder = ZlibEncoder::new(out, Compression::new(self.level));
        encoder.write_all(raw)?;
        encoder.finish()?;
        Ok(())
    }

    fn decompress(&self, data: &[u8], raw_len: usize, out: &mut Vec<u8>) -> io::Result<()> {
        out.reserve(raw_len);
        ZlibDecoder::new(data).read_to_end(out)?;
        Ok(())
    }
}

/// Mapping from scheme name to codec.
///
/// The registry is passed explicitly to writers and readers; [`CompressionRegistry::default`]
/// holds the built-in schemes (`gzip`, `zlib`, `none`).
#[derive(Clone)]
pub struct CompressionRegistry {
    codecs: BTreeMap<String, Arc<dyn Codec>>,
}

impl CompressionRegistry {
    /// A registry with no schemes at all.
    pub fn empty() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    /// Register `codec` under its own name, replacing any previous scheme with that name.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.name().to_owned(), codec);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Codec>> {
        self.codecs.get(name).cloned().ok_or_else(|| {
            DsutilError::config(format!(
                "unknown compression {name:?} (known: {})",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Gzip::default()));
        registry.register(Arc::new(Zlib::default()));
        registry.register(Arc::new(NoCompression));
        registry
    }
}

impl fmt::Debug for CompressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
