//! hcdb binary entry point.
//!
//! Parses the command line, initializes logging on stderr and dispatches to
//! the handlers in the `hcdb_cli` library. Database bytes and query results
//! are the only things ever written to stdout.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, builder::FalseyValueParser};
use hcdb::UpdateOptions;
use std::io;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use hcdb_cli::{UpdateCommands, commands};

#[derive(Parser)]
#[command(
    name = "hcdb",
    about = "Create, query and manipulate constant databases",
    version,
    long_about = "Create, query and manipulate constant databases (CDB).\n\nCommands read the database from stdin and write it to stdout unless --file is given."
)]
struct Cli {
    /// Set the logging level (overridden by RUST_LOG)
    #[arg(short, long, value_enum, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Operate on FILE instead of stdin/stdout
    #[arg(short, long, global = true, env = "HCDB_FILE", value_name = "FILE")]
    file: Option<PathBuf>,

    /// Do not fsync new files before renaming them into place
    #[arg(long, global = true, env = "HCDB_NO_SYNC", value_parser = FalseyValueParser::new())]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Make a new database from key/value pairs
    Make {
        /// Include the KEY->VALUE pair in the database (repeatable)
        #[arg(long = "kv", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
        kv: Vec<String>,
    },

    /// Print every value stored under a key
    Query {
        /// The key to be retrieved
        key: String,
    },

    /// Add or remove records of an existing database file
    #[command(subcommand)]
    Update(UpdateCommands),

    /// Print every record in cdbdump format
    Dump,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout may carry database bytes
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(cli.log_level.into()).into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let options = UpdateOptions::default().with_sync(!cli.no_sync);
    let file = cli.file.as_deref();
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Make { kv } => commands::make::handle(file, &kv, options, &mut stdout)?,
        Commands::Query { key } => {
            commands::query::handle(file, &key, io::stdin().lock(), &mut stdout)?;
        }
        Commands::Update(cmd) => commands::update::handle(cmd, file, options, &mut stdout)?,
        Commands::Dump => commands::dump::handle(file, io::stdin().lock(), &mut stdout)?,
    }

    Ok(())
}
