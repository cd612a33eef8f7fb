use anyhow::{Context, Result};
use hcdb::CdbReader;
use std::io::{Read, Write};
use std::path::Path;

use super::{open_file, read_input};

/// Print every record in file order
///
/// Uses the classic cdbdump text form, one `+klen,vlen:key->value` line per
/// record and an empty line at the end. Keys and values are written raw.
pub fn handle<R: Read, W: Write>(file: Option<&Path>, input: R, output: &mut W) -> Result<()> {
    match file {
        Some(path) => dump(&open_file(path)?, output),
        None => dump(&read_input(input)?, output),
    }
}

fn dump<B: AsRef<[u8]>, W: Write>(reader: &CdbReader<B>, output: &mut W) -> Result<()> {
    for record in reader {
        let (key, value) = record.context("Failed to read record")?;
        write!(output, "+{},{}:", key.len(), value.len())?;
        output.write_all(key)?;
        output.write_all(b"->")?;
        output.write_all(value)?;
        output.write_all(b"\n")?;
    }
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}
