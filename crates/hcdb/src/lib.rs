//! Constant database engine
//!
//! A constant database (CDB) is a single file mapping byte-string keys to
//! byte-string values. It is built once and then only read: lookups cost at
//! most two reads into the file and need no locking, and a key may hold
//! several values which come back in the order they were added.
//!
//! # Components
//!
//! - **Hashing**: [`hash`] is the 32-bit function that places keys in tables
//! - **Writing**: [`CdbWriter`] streams records to any seekable sink
//! - **Reading**: [`CdbReader`] looks keys up in a mapped file or a buffer
//! - **Updating**: [`append_pairs`] and [`remove_key`] rewrite a database
//!   through a temporary file and an atomic rename ([`AtomicWriter`])
//!
//! # File layout
//!
//! ```text
//! +--------------------------+ 0
//! | 256 x (position, slots)  |   table pointers, u32 little-endian
//! +--------------------------+ 2048
//! | klen | vlen | key | val  |   records, in insertion order
//! | ...                      |
//! +--------------------------+
//! | 256 x [(hash, position)] |   open-addressing tables, 2 slots per record
//! +--------------------------+
//! ```
//!
//! # Examples
//!
//! ## Build and query
//!
//! ```
//! use hcdb::{CdbReader, CdbWriter};
//! use std::io::Cursor;
//!
//! let mut writer = CdbWriter::new(Cursor::new(Vec::new()))?;
//! writer.put_all([("a", "1"), ("b", "2"), ("a", "3")])?;
//! writer.finish()?;
//!
//! let reader = CdbReader::from_bytes(writer.into_inner()?.into_inner())?;
//! assert_eq!(reader.get(b"a")?, Some(&b"1"[..]));
//! assert_eq!(reader.len(), 3);
//! # Ok::<(), hcdb::CdbError>(())
//! ```
//!
//! ## Update a file
//!
//! ```no_run
//! use hcdb::{append_pairs, remove_key};
//!
//! append_pairs("data.cdb", [("c", "4")])?;
//! let stats = remove_key("data.cdb", b"a")?;
//! println!("{stats}");
//! # Ok::<(), hcdb::CdbError>(())
//! ```

#![warn(missing_docs)]

pub mod atomic;
pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod reader;
pub mod update;
pub mod writer;

pub use atomic::AtomicWriter;
pub use config::UpdateOptions;
pub use error::{CdbError, CdbResult};
pub use hash::{CdbHasher, hash};
pub use reader::{CdbReader, Records, Values};
pub use update::{
    UpdateStats, append_pairs, append_pairs_with, rebuild, remove_key, remove_key_with,
};
pub use writer::CdbWriter;
