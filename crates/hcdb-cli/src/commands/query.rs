use anyhow::{Context, Result};
use hcdb::CdbReader;
use std::io::{Read, Write};
use std::path::Path;

use super::{open_file, read_input};

/// Print every value stored under `key`, one per line
///
/// A missing key prints nothing and is not an error.
pub fn handle<R: Read, W: Write>(
    file: Option<&Path>,
    key: &str,
    input: R,
    output: &mut W,
) -> Result<()> {
    match file {
        Some(path) => print_values(&open_file(path)?, key.as_bytes(), output),
        None => print_values(&read_input(input)?, key.as_bytes(), output),
    }
}

fn print_values<B: AsRef<[u8]>, W: Write>(
    reader: &CdbReader<B>,
    key: &[u8],
    output: &mut W,
) -> Result<()> {
    let mut found = 0usize;
    for value in reader.get_all(key) {
        let value = value.context("Failed to read value")?;
        output.write_all(value)?;
        output.write_all(b"\n")?;
        found += 1;
    }
    output.flush()?;

    tracing::debug!("{} values found", found);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::make;
    use hcdb::UpdateOptions;
    use std::io;

    fn database(kv: &[&str]) -> Vec<u8> {
        let flat: Vec<String> = kv.iter().map(ToString::to_string).collect();
        let mut out = Vec::new();
        make::handle(None, &flat, UpdateOptions::default(), &mut out).unwrap();
        out
    }

    #[test]
    fn test_query_from_input_stream() {
        let db = database(&["a", "1", "b", "2", "a", "3"]);

        let mut out = Vec::new();
        handle(None, "a", db.as_slice(), &mut out).unwrap();
        assert_eq!(out, b"1\n3\n");

        let mut out = Vec::new();
        handle(None, "c", db.as_slice(), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_query_garbage_input_fails() {
        let mut out = Vec::new();
        let err = handle(None, "a", io::repeat(7).take(100), &mut out).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read database"));
    }
}
