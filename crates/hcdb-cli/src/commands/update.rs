use anyhow::{Context, Result};
use hcdb::{UpdateOptions, append_pairs_with, remove_key_with};
use std::io::Write;
use std::path::Path;

use crate::{UpdateCommands, pairs};

/// Rewrite the database at `file` in place
///
/// Updates replace a file atomically, so they cannot work on streams.
pub fn handle<W: Write>(
    cmd: UpdateCommands,
    file: Option<&Path>,
    options: UpdateOptions,
    output: &mut W,
) -> Result<()> {
    let path = file.context("update needs a database file, pass --file")?;

    let stats = match cmd {
        UpdateCommands::Add { kv } => append_pairs_with(path, pairs(&kv), options)
            .with_context(|| format!("Failed to add records to {}", path.display()))?,
        UpdateCommands::Rm { key } => remove_key_with(path, key.as_bytes(), options)
            .with_context(|| format!("Failed to remove {key:?} from {}", path.display()))?,
    };

    // stdout stays empty; the summary goes to the log
    tracing::info!("{}", stats);
    output.flush()?;
    Ok(())
}
