//! Command handlers

pub mod dump;
pub mod make;
pub mod query;
pub mod update;

use anyhow::{Context, Result};
use hcdb::CdbReader;
use std::io::Read;
use std::path::Path;

/// Memory-map the database at `path`
fn open_file(path: &Path) -> Result<CdbReader<impl AsRef<[u8]>>> {
    CdbReader::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Read a whole database from the input stream
fn read_input<R: Read>(input: R) -> Result<CdbReader<Vec<u8>>> {
    CdbReader::from_reader(input).context("Failed to read database from stdin")
}
