//! In-place updates of existing databases
//!
//! A constant database cannot be modified, so every update streams the old
//! records into a fresh [`AtomicWriter`] next to the original, applies the
//! change on the way, and renames the result over the old file. Readers that
//! already have the old file open keep seeing the old contents.
//!
//! Record order is preserved: copied records keep their relative order and
//! appended records follow them, so `get_all` keeps returning values in
//! insertion order across updates.

use std::fmt;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info};

use crate::atomic::AtomicWriter;
use crate::config::UpdateOptions;
use crate::error::CdbResult;
use crate::reader::CdbReader;

/// Record counts of a completed update
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStats {
    /// Records carried over from the old database
    pub copied: u64,
    /// New records appended
    pub added: u64,
    /// Old records dropped
    pub removed: u64,
}

impl UpdateStats {
    /// Number of records in the new database
    pub fn total(&self) -> u64 {
        self.copied + self.added
    }
}

impl fmt::Display for UpdateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} copied, {} added, {} removed",
            self.copied, self.added, self.removed
        )
    }
}

/// Replace the database at `path` with the output of `transform`
///
/// `transform` receives the current database and an empty staged writer.
/// When it succeeds the staged database replaces the file; when it fails the
/// staged file is discarded and the original is left byte-for-byte intact.
pub fn rebuild<P, F>(path: P, options: UpdateOptions, transform: F) -> CdbResult<UpdateStats>
where
    P: AsRef<Path>,
    F: FnOnce(&CdbReader<Mmap>, &mut AtomicWriter) -> CdbResult<UpdateStats>,
{
    let path = path.as_ref();
    let reader = CdbReader::open(path)?;
    let mut staged = AtomicWriter::create_with(path, options)?;

    let stats = transform(&reader, &mut staged)?;

    // Unmap before the rename so the old file can be reclaimed right away
    drop(reader);
    staged.commit()?;

    info!("Updated {}: {}", path.display(), stats);
    Ok(stats)
}

/// Append records to an existing database with default options
///
/// Existing records are kept in order and the new ones follow, so appending
/// an existing key adds another value rather than replacing it.
pub fn append_pairs<P, I, K, V>(path: P, pairs: I) -> CdbResult<UpdateStats>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    append_pairs_with(path, pairs, UpdateOptions::default())
}

/// Append records to an existing database
pub fn append_pairs_with<P, I, K, V>(
    path: P,
    pairs: I,
    options: UpdateOptions,
) -> CdbResult<UpdateStats>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    rebuild(path, options, |reader, staged| {
        let mut stats = UpdateStats::default();
        for record in reader {
            let (key, value) = record?;
            staged.put(key, value)?;
            stats.copied += 1;
        }
        for (key, value) in pairs {
            staged.put(key.as_ref(), value.as_ref())?;
            stats.added += 1;
        }
        Ok(stats)
    })
}

/// Remove every record stored under `key` with default options
///
/// Removing a key that is not present still rewrites the file and reports
/// zero removed records.
pub fn remove_key<P: AsRef<Path>>(path: P, key: &[u8]) -> CdbResult<UpdateStats> {
    remove_key_with(path, key, UpdateOptions::default())
}

/// Remove every record stored under `key`
pub fn remove_key_with<P: AsRef<Path>>(
    path: P,
    key: &[u8],
    options: UpdateOptions,
) -> CdbResult<UpdateStats> {
    rebuild(path, options, |reader, staged| {
        let mut stats = UpdateStats::default();
        for record in reader {
            let (existing, value) = record?;
            if existing == key {
                stats.removed += 1;
            } else {
                staged.put(existing, value)?;
                stats.copied += 1;
            }
        }
        if stats.removed == 0 {
            debug!("Key not present, database rewritten unchanged");
        }
        Ok(stats)
    })
}
