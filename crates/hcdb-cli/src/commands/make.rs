use anyhow::{Context, Result};
use hcdb::{AtomicWriter, CdbWriter, UpdateOptions};
use std::io::{Cursor, Write};
use std::path::Path;

use crate::pairs;

/// Build a new database from `--kv` pairs
///
/// With a file the database is staged next to it and renamed into place,
/// replacing any existing file. Without one it is built in memory, since
/// stdout cannot seek back to the header, and then written to `output`.
pub fn handle<W: Write>(
    file: Option<&Path>,
    kv: &[String],
    options: UpdateOptions,
    output: &mut W,
) -> Result<()> {
    match file {
        Some(path) => {
            let mut writer = AtomicWriter::create_with(path, options)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            writer.put_all(pairs(kv)).context("Failed to add records")?;
            let records = writer.len();
            writer
                .commit()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Created {} with {} records", path.display(), records);
        }
        None => {
            let mut writer = CdbWriter::new(Cursor::new(Vec::new()))?;
            writer.put_all(pairs(kv)).context("Failed to add records")?;
            writer.finish()?;
            let bytes = writer.into_inner()?.into_inner();
            output
                .write_all(&bytes)
                .context("Failed to write database to stdout")?;
            output.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use hcdb::CdbReader;

    fn flat(kv: &[&str]) -> Vec<String> {
        kv.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_make_to_stream() {
        let mut out = Vec::new();
        handle(None, &flat(&["k", "v"]), UpdateOptions::default(), &mut out).unwrap();

        let reader = CdbReader::from_bytes(out).unwrap();
        assert_eq!(reader.get(b"k").unwrap(), Some(b"v".as_slice()));
    }

    #[test]
    fn test_make_without_pairs_builds_empty_database() {
        let mut out = Vec::new();
        handle(None, &[], UpdateOptions::default(), &mut out).unwrap();

        let reader = CdbReader::from_bytes(out).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_make_file_writes_nothing_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.cdb");

        let mut out = Vec::new();
        let options = UpdateOptions::default().with_sync(false);
        handle(Some(&path), &flat(&["a", "1", "a", "2"]), options, &mut out).unwrap();
        assert!(out.is_empty());

        let reader = CdbReader::open(&path).unwrap();
        assert_eq!(reader.len(), 2);
    }
}
