//! Crash-safe creation of database files
//!
//! [`AtomicWriter`] builds a database in a temporary file next to the
//! destination and renames it into place on [`AtomicWriter::commit`]. The
//! rename replaces any existing file in one step, so other processes see
//! either the previous database or the new one, never a partial file.
//!
//! If the writer is dropped before `commit` (an error was propagated with
//! `?`, a panic unwound, the caller gave up) the temporary file is deleted and
//! the destination is left untouched.
//!
//! ```rust,no_run
//! use hcdb::AtomicWriter;
//!
//! let mut writer = AtomicWriter::create("settings.cdb")?;
//! writer.put(b"theme", b"dark")?;
//! writer.put(b"lang", b"en")?;
//! writer.commit()?;
//! # Ok::<(), hcdb::CdbError>(())
//! ```

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::UpdateOptions;
use crate::error::{CdbError, CdbResult};
use crate::writer::CdbWriter;

/// Prefix of temporary database files
pub const TEMP_PREFIX: &str = ".hcdb-";

/// Suffix of temporary database files
pub const TEMP_SUFFIX: &str = ".tmp";

type StagedWriter = CdbWriter<BufWriter<NamedTempFile>>;

/// Database writer that publishes its file only on commit
pub struct AtomicWriter {
    target: PathBuf,
    /// `None` once committed
    writer: Option<StagedWriter>,
    options: UpdateOptions,
}

impl AtomicWriter {
    /// Stage a new database for `path` with default options
    pub fn create<P: AsRef<Path>>(path: P) -> CdbResult<Self> {
        Self::create_with(path, UpdateOptions::default())
    }

    /// Stage a new database for `path`
    ///
    /// The temporary file is created in the same directory as `path` so the
    /// final rename never crosses a filesystem boundary.
    pub fn create_with<P: AsRef<Path>>(path: P, options: UpdateOptions) -> CdbResult<Self> {
        let target = path.as_ref().to_path_buf();
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(parent_dir(&target))?;

        debug!(
            "Staging {} in {}",
            target.display(),
            temp.path().display()
        );

        Ok(Self {
            target,
            writer: Some(CdbWriter::new(BufWriter::new(temp))?),
            options,
        })
    }

    fn writer(&mut self) -> CdbResult<&mut StagedWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| CdbError::InvalidState("database already committed".to_string()))
    }

    /// Append one record
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> CdbResult<()> {
        self.writer()?.put(key, value)
    }

    /// Append every pair of an iterator, in order
    pub fn put_all<I, K, V>(&mut self, pairs: I) -> CdbResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.writer()?.put_all(pairs)
    }

    /// Number of records added so far
    pub fn len(&self) -> u64 {
        self.writer.as_ref().map_or(0, CdbWriter::len)
    }

    /// Check if no record has been added
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Final location of the database
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Location of the temporary file being written
    pub fn temp_path(&self) -> Option<&Path> {
        self.writer
            .as_ref()
            .map(|writer| writer.get_ref().get_ref().path())
    }

    /// Finalize the database and move it over the destination
    pub fn commit(mut self) -> CdbResult<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| CdbError::InvalidState("database already committed".to_string()))?;

        writer.finish()?;
        let records = writer.len();
        let temp = writer
            .into_inner()?
            .into_inner()
            .map_err(|err| CdbError::Io(err.into_error()))?;

        if self.options.preserve_permissions {
            if let Ok(metadata) = fs::metadata(&self.target) {
                temp.as_file().set_permissions(metadata.permissions())?;
            }
        }
        if self.options.sync {
            temp.as_file().sync_all()?;
        }

        temp.persist(&self.target)?;
        debug!(
            "Committed {} records to {}",
            records,
            self.target.display()
        );
        Ok(())
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if let Some(writer) = &self.writer {
            warn!(
                "Discarding unfinished database for {} ({} records)",
                self.target.display(),
                writer.len()
            );
        }
    }
}

/// Directory that will hold the temporary file for `path`
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reader::CdbReader;

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(TEMP_PREFIX))
            })
            .collect()
    }

    #[test]
    fn test_commit_publishes_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.cdb");

        let mut writer = AtomicWriter::create(&path).unwrap();
        assert_eq!(writer.target(), path.as_path());
        assert!(writer.is_empty());
        writer.put(b"key", b"value").unwrap();
        assert_eq!(writer.len(), 1);
        assert!(!path.exists());

        let temp = writer.temp_path().unwrap().to_path_buf();
        assert_eq!(temp.parent(), Some(dir.path()));

        writer.commit().unwrap();
        assert!(!temp.exists());

        let reader = CdbReader::open(&path).unwrap();
        assert_eq!(reader.get(b"key").unwrap(), Some(b"value".as_slice()));
        assert!(temp_files(dir.path()).is_empty());
    }

    #[test]
    fn test_drop_discards_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.cdb");
        fs::write(&path, b"previous contents").unwrap();

        {
            let mut writer = AtomicWriter::create(&path).unwrap();
            writer.put(b"key", b"value").unwrap();
            assert_eq!(temp_files(dir.path()).len(), 1);
        }

        assert!(temp_files(dir.path()).is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"previous contents");
    }

    #[test]
    fn test_commit_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.cdb");
        fs::write(&path, b"old").unwrap();

        let mut writer =
            AtomicWriter::create_with(&path, UpdateOptions::default().with_sync(false)).unwrap();
        writer.put_all([("a", "1"), ("b", "2")]).unwrap();
        writer.commit().unwrap();

        let reader = CdbReader::open(&path).unwrap();
        assert_eq!(reader.len(), 2);
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("db.cdb");
        let err = AtomicWriter::create(&path).err().unwrap();
        assert!(err.is_io());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.cdb");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let writer = AtomicWriter::create(&path).unwrap();
        writer.commit().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("db.cdb")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/db.cdb")), Path::new("data"));
    }
}
