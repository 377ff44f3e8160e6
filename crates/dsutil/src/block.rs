//! Block framing for column files.
//!
//! A column file is a sequence of blocks:
//!
//! ```text
//! u32 LE  stored length (bytes of compressed payload)
//! u32 LE  raw length    (bytes after decompression, at most BLOCK_SIZE)
//! [u8]    payload
//! ```
//!
//! Each block is compressed independently. The typed layer sees one logical byte stream; items
//! are allowed to straddle block boundaries.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dsutil_fs::StagedFile;

use crate::compression::Codec;
use crate::error::{DsutilError, Result};

/// Nominal raw size of one block.
pub const BLOCK_SIZE: usize = 128 * 1024;

const HEADER_LEN: usize = 8;

// Generous bound on the stored size of a block; anything larger is treated as corruption rather
// than an allocation request.
const MAX_STORED_LEN: usize = 16 * BLOCK_SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockTotals {
    pub blocks: u64,
    pub raw_bytes: u64,
    pub stored_bytes: u64,
}

/// Appends a logical byte stream to a staged column file.
#[derive(Debug)]
pub struct BlockWriter {
    stage: Option<StagedFile>,
    codec: Arc<dyn Codec>,
    buf: Vec<u8>,
    packed: Vec<u8>,
    totals: BlockTotals,
}

impl BlockWriter {
    pub fn create(path: &Path, codec: Arc<dyn Codec>) -> Result<Self> {
        let stage = StagedFile::create(path).map_err(|source| DsutilError::DestinationUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            stage: Some(stage),
            codec,
            buf: Vec::with_capacity(BLOCK_SIZE),
            packed: Vec::new(),
            totals: BlockTotals::default(),
        })
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn append(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let take = (BLOCK_SIZE - self.buf.len()).min(bytes.len());
            self.buf.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.buf.len() == BLOCK_SIZE {
                self.emit_block()?;
            }
        }
        Ok(())
    }

    /// Emit the pending partial block (if any) to the stage.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.emit_block()?;
        }
        if let Some(stage) = self.stage.as_mut() {
            stage.flush()?;
        }
        Ok(())
    }

    /// Flush and move the column file into place.
    pub fn finish(mut self) -> Result<BlockTotals> {
        self.flush()?;
        let stage = self.stage.take().ok_or_else(finished)?;
        let dest = stage.dest().to_path_buf();
        stage.commit()?;
        log::debug!(
            "committed {} ({} blocks, {} raw bytes, {} stored bytes)",
            dest.display(),
            self.totals.blocks,
            self.totals.raw_bytes,
            self.totals.stored_bytes
        );
        Ok(self.totals)
    }

    /// Drop everything written so far; the destination is left untouched.
    pub fn discard(mut self) -> Result<()> {
        match self.stage.take() {
            Some(stage) => {
                log::debug!("discarding staged column file for {}", stage.dest().display());
                Ok(stage.discard()?)
            }
            None => Ok(()),
        }
    }

    fn emit_block(&mut self) -> Result<()> {
        self.packed.clear();
        self.codec.compress(&self.buf, &mut self.packed)?;
        let stored_len = u32::try_from(self.packed.len())
            .map_err(|_| DsutilError::Corrupt("compressed block exceeds u32".to_owned()))?;
        let raw_len = self.buf.len() as u32;

        let stage = self.stage.as_mut().ok_or_else(finished)?;
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&stored_len.to_le_bytes());
        header[4..].copy_from_slice(&raw_len.to_le_bytes());
        stage.write_all(&header)?;
        stage.write_all(&self.packed)?;

        self.totals.blocks += 1;
        self.totals.raw_bytes += u64::from(raw_len);
        self.totals.stored_bytes += (HEADER_LEN + self.packed.len()) as u64;
        log::trace!(
            "block {} of {}: {raw_len} -> {stored_len} bytes ({})",
            self.totals.blocks,
            stage.dest().display(),
            self.codec.name()
        );
        self.buf.clear();
        Ok(())
    }
}

impl Drop for BlockWriter {
    fn drop(&mut self) {
        if let Some(stage) = self.stage.take() {
            log::warn!(
                "column writer for {} dropped without close; discarding {} blocks",
                stage.dest().display(),
                self.totals.blocks
            );
            if let Err(err) = stage.discard() {
                log::warn!("failed to remove staged column file: {err}");
            }
        }
    }
}

fn finished() -> DsutilError {
    DsutilError::Io(io::Error::new(
        io::ErrorKind::Other,
        "column writer already finished",
    ))
}

/// Reads back the logical byte stream of a column file.
#[derive(Debug)]
pub struct BlockReader {
    path: PathBuf,
    file: BufReader<File>,
    codec: Arc<dyn Codec>,
    block: Vec<u8>,
    pos: usize,
    packed: Vec<u8>,
    blocks_read: u64,
}

impl BlockReader {
    pub fn open(path: &Path, codec: Arc<dyn Codec>) -> Result<Self> {
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => DsutilError::NotFound {
                path: path.to_path_buf(),
            },
            _ => DsutilError::Io(err),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            codec,
            block: Vec::with_capacity(BLOCK_SIZE),
            pos: 0,
            packed: Vec::new(),
            blocks_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// True once every byte of the stream has been consumed.
    pub fn at_end(&mut self) -> Result<bool> {
        while self.pos == self.block.len() {
            if !self.next_block()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn read_exact(&mut self, mut out: &mut [u8]) -> Result<()> {
        while !out.is_empty() {
            if self.at_end()? {
                return Err(self.corrupt("item truncated at end of stream"));
            }
            let available = &self.block[self.pos..];
            let take = available.len().min(out.len());
            out[..take].copy_from_slice(&available[..take]);
            self.pos += take;
            out = &mut out[take..];
        }
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.read_exact(&mut out)?;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read `len` bytes, growing the buffer as data arrives so a corrupt length cannot force a
    /// huge allocation up front.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(BLOCK_SIZE));
        while out.len() < len {
            if self.at_end()? {
                return Err(self.corrupt("item truncated at end of stream"));
            }
            let available = &self.block[self.pos..];
            let take = available.len().min(len - out.len());
            out.extend_from_slice(&available[..take]);
            self.pos += take;
        }
        Ok(out)
    }

    /// Load the next block. Returns `false` at a clean end of file.
    fn next_block(&mut self) -> Result<bool> {
        let mut header = [0u8; HEADER_LEN];
        match read_full(&mut self.file, &mut header)? {
            0 => return Ok(false),
            HEADER_LEN => {}
            n => return Err(self.corrupt(format!("truncated block header ({n} bytes)"))),
        }
        let stored_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let raw_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if raw_len > BLOCK_SIZE || stored_len > MAX_STORED_LEN {
            return Err(self.corrupt(format!(
                "block {} claims {stored_len} stored / {raw_len} raw bytes",
                self.blocks_read
            )));
        }

        self.packed.resize(stored_len, 0);
        if read_full(&mut self.file, &mut self.packed)? != stored_len {
            return Err(self.corrupt(format!("block {} payload truncated", self.blocks_read)));
        }

        self.block.clear();
        self.codec
            .decompress(&self.packed, raw_len, &mut self.block)
            .map_err(|err| self.corrupt(format!("block {}: {err}", self.blocks_read)))?;
        if self.block.len() != raw_len {
            return Err(self.corrupt(format!(
                "block {} decompressed to {} bytes, header says {raw_len}",
                self.blocks_read,
                self.block.len()
            )));
        }
        self.pos = 0;
        self.blocks_read += 1;
        Ok(true)
    }

    fn corrupt(&self, message: impl std::fmt::Display) -> DsutilError {
        DsutilError::Corrupt(format!("{}: {message}", self.path.display()))
    }
}

/// Like `read_exact`, but reports how many bytes were read before EOF instead of failing.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionRegistry;

    fn gzip() -> Arc<dyn Codec> {
        CompressionRegistry::default().get("gzip").expect("gzip")
    }

    #[test]
    fn items_straddling_blocks_read_back() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("col");

        let item: Vec<u8> = (0..=250u8).collect();
        let mut writer = BlockWriter::create(&path, gzip()).expect("create");
        let items = BLOCK_SIZE / item.len() * 3 + 7;
        for _ in 0..items {
            writer.append(&item).expect("append");
        }
        let totals = writer.finish().expect("finish");
        assert_eq!(totals.raw_bytes, (items * item.len()) as u64);
        assert_eq!(totals.blocks, 4);

        let mut reader = BlockReader::open(&path, gzip()).expect("open");
        for _ in 0..items {
            assert_eq!(reader.read_vec(item.len()).expect("item"), item);
        }
        assert!(reader.at_end().expect("at_end"));
        assert_eq!(reader.blocks_read(), 4);
    }

    #[test]
    fn flush_mid_stream_emits_short_block() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("col");

        let mut writer = BlockWriter::create(&path, gzip()).expect("create");
        writer.append(b"abc").expect("append");
        writer.flush().expect("flush");
        writer.append(b"def").expect("append");
        assert_eq!(writer.finish().expect("finish").blocks, 2);

        let mut reader = BlockReader::open(&path, gzip()).expect("open");
        assert_eq!(reader.read_array::<6>().expect("read"), *b"abcdef");
        assert!(reader.at_end().expect("at_end"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let err = BlockReader::open(&tmp.path().join("DOES/NOT/EXIST"), gzip())
            .expect_err("missing file");
        assert!(matches!(err, DsutilError::NotFound { .. }), "{err}");
    }

    #[test]
    fn uncreatable_parent_is_destination_unavailable() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").expect("write blocker");

        let err = BlockWriter::create(&blocker.join("col"), gzip()).expect_err("parent is a file");
        assert!(
            matches!(err, DsutilError::DestinationUnavailable { .. }),
            "{err}"
        );
    }

    #[test]
    fn dropped_writer_leaves_no_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("col");
        {
            let mut writer = BlockWriter::create(&path, gzip()).expect("create");
            writer.append(&[1; 1000]).expect("append");
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).expect("read_dir").count(), 0);
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("col");
        let mut writer = BlockWriter::create(&path, gzip()).expect("create");
        writer.append(&[7; 5000]).expect("append");
        writer.finish().expect("finish");

        let bytes = std::fs::read(&path).expect("read");
        std::fs::write(&path, &bytes[..bytes.len() - 3]).expect("truncate");

        let mut reader = BlockReader::open(&path, gzip()).expect("open");
        let err = reader.read_vec(5000).expect_err("truncated payload");
        assert!(matches!(err, DsutilError::Corrupt(_)), "{err}");
    }

    #[test]
    fn wrong_codec_is_corrupt() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("col");
        let none = CompressionRegistry::default().get("none").expect("none");
        let mut writer = BlockWriter::create(&path, none).expect("create");
        writer.append(b"plain bytes").expect("append");
        writer.finish().expect("finish");

        let mut reader = BlockReader::open(&path, gzip()).expect("open");
        assert!(matches!(reader.read_u8(), Err(DsutilError::Corrupt(_))));
    }
}
