//! Staged file creation for column files.
//!
//! A column file is never written in place. Instead:
//! - parent directories are created (if needed)
//! - data goes to a temp file in the same directory (avoids cross-device renames)
//! - on commit the temp file is flushed + `sync_all`ed and renamed into place with replace
//!   semantics (including on Windows)
//!
//! A stage that is dropped without being committed removes its temp file, so readers never
//! observe a partially written column at the destination path.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Return the directory a file at `path` would live in.
pub fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` returns `Some("")` for bare relative file names like `column.gz`.
    // Treat that as the current directory so callers can use relative paths without
    // having to prepend `./`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// A file being written next to its final destination.
#[derive(Debug)]
pub struct StagedFile {
    dest: PathBuf,
    tmp: NamedTempFile,
}

impl StagedFile {
    /// Create the parent directory of `dest` and open a temp file beside it.
    ///
    /// Errors from directory creation and temp file creation are returned unchanged so the
    /// caller can tell an unavailable destination apart from later write failures.
    pub fn create(dest: impl AsRef<Path>) -> io::Result<Self> {
        let dest = dest.as_ref();
        let dir = parent_dir_or_dot(dest);
        fs::create_dir_all(dir)?;
        let tmp = tempfile::Builder::new()
            .prefix(".staged-")
            .tempfile_in(dir)?;
        Ok(Self {
            dest: dest.to_path_buf(),
            tmp,
        })
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Flush, sync and rename the staged data into place.
    pub fn commit(mut self) -> io::Result<()> {
        self.tmp.as_file_mut().flush()?;
        self.tmp.as_file().sync_all()?;

        let tmp_path = self.tmp.into_temp_path();
        replace_file(tmp_path.as_ref(), &self.dest)?;
        // The rename consumed the temp file; don't let `TempPath` try to delete the destination.
        let _ = tmp_path.keep();

        // Best-effort: sync directory metadata after the rename.
        // Failures here should not be treated as a write failure (the file is already in place).
        if let Err(err) = sync_parent_dir(&self.dest) {
            log::trace!("directory sync after commit of {} failed: {err}", self.dest.display());
        }
        Ok(())
    }

    /// Remove the staged data without touching the destination.
    pub fn discard(self) -> io::Result<()> {
        self.tmp.close()
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.as_file_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.as_file_mut().flush()
    }
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = parent_dir_or_dot(path);
    // On most Unix platforms, opening a directory as a file is supported.
    // On others (or on Windows), this may fail; callers treat it as best-effort.
    let dir = File::open(parent)?;
    dir.sync_all()
}

fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt as _;
        use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_REPLACE_EXISTING};

        fn to_wide_null(path: &Path) -> Vec<u16> {
            let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
            wide.push(0);
            wide
        }

        let from_w = to_wide_null(from);
        let to_w = to_wide_null(to);
        let ok = unsafe { MoveFileExW(from_w.as_ptr(), to_w.as_ptr(), MOVEFILE_REPLACE_EXISTING) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(windows))]
    {
        fs::rename(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    struct CwdGuard {
        old: std::path::PathBuf,
    }

    impl CwdGuard {
        fn chdir(path: &Path) -> Self {
            let old = std::env::current_dir().expect("current_dir");
            std::env::set_current_dir(path).expect("set_current_dir");
            Self { old }
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.old);
        }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("dir entry").path())
            .filter(|p| p.is_file())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn staged_file_supports_relative_dest_in_current_directory() {
        let _guard = CWD_LOCK.lock().expect("lock");

        let tmp = tempfile::tempdir().expect("temp dir");
        let _cwd = CwdGuard::chdir(tmp.path());

        // `column.bin` has an empty `Path::parent()`; this should still work.
        let mut staged = StagedFile::create("column.bin").expect("stage");
        staged.write_all(b"hello").expect("write");
        staged.commit().expect("commit");
        assert_eq!(
            std::fs::read(tmp.path().join("column.bin")).expect("read file"),
            b"hello"
        );
    }

    #[test]
    fn destination_is_absent_until_commit() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("nested").join("dir").join("column.bin");

        let mut staged = StagedFile::create(&dest).expect("stage");
        staged.write_all(b"partial").expect("write");
        assert!(!dest.exists(), "destination visible before commit");

        staged.commit().expect("commit");
        assert_eq!(std::fs::read(&dest).expect("read dest"), b"partial");
        assert_eq!(files_in(dest.parent().unwrap()), vec![dest.clone()]);
    }

    #[test]
    fn dropped_stage_does_not_clobber_existing_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("existing.bin");

        let sentinel = b"sentinel-bytes";
        std::fs::write(&dest, sentinel).expect("write sentinel dest file");

        {
            let mut staged = StagedFile::create(&dest).expect("stage");
            staged.write_all(b"replacement").expect("write");
            // dropped without commit
        }

        let got = std::fs::read(&dest).expect("read dest");
        assert_eq!(got, sentinel, "dest file should not be clobbered");
        assert_eq!(
            files_in(tmp.path()),
            vec![dest.clone()],
            "expected only the destination file to remain (no temp files)"
        );
    }

    #[test]
    fn commit_replaces_existing_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("existing.bin");
        std::fs::write(&dest, b"old").expect("write old");

        let mut staged = StagedFile::create(&dest).expect("stage");
        staged.write_all(b"new").expect("write");
        staged.commit().expect("commit");

        assert_eq!(std::fs::read(&dest).expect("read dest"), b"new");
    }

    #[test]
    fn create_fails_when_parent_is_a_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write blocker");

        StagedFile::create(blocker.join("column.bin")).expect_err("parent is a file");
        assert_eq!(files_in(tmp.path()), vec![blocker.clone()]);
    }
}
