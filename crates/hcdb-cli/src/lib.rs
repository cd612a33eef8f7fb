//! hcdb command-line library
//!
//! Command handlers for the `hcdb` binary. Handlers take their input and
//! output streams as arguments so they can be driven from tests as well as
//! from the real stdin and stdout.

pub mod commands;

// Re-export command handlers
pub use crate::commands::{
    dump::handle as handle_dump, make::handle as handle_make, query::handle as handle_query,
    update::handle as handle_update,
};

use clap::{ArgAction, Subcommand};

/// Subcommands of `hcdb update`
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum UpdateCommands {
    /// Append key/value pairs after the existing records
    Add {
        /// Include the KEY->VALUE pair in the database (repeatable)
        #[arg(long = "kv", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
        kv: Vec<String>,
    },

    /// Remove a key and all of its values
    Rm {
        /// The key to be deleted
        key: String,
    },
}

/// Split the flat `--kv KEY VALUE ...` list into pairs
///
/// Clap guarantees an even count; a dangling element is ignored.
pub fn pairs(flat: &[String]) -> impl Iterator<Item = (&str, &str)> {
    flat.chunks_exact(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
}
