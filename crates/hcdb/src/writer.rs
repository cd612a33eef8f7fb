//! Two-pass constant database builder
//!
//! Records are streamed to the sink as they are added, right after a zeroed
//! placeholder header. Only the `(hash, offset)` pair of each record is kept
//! in memory. [`CdbWriter::finish`] then lays out the 256 bucket tables after
//! the data, seeks back and writes the real header.
//!
//! # Example
//!
//! ```rust
//! use hcdb::{CdbReader, CdbWriter};
//! use std::io::Cursor;
//!
//! let mut writer = CdbWriter::new(Cursor::new(Vec::new()))?;
//! writer.put(b"a", b"1")?;
//! writer.put(b"b", b"2")?;
//! writer.put(b"a", b"3")?;
//! writer.finish()?;
//!
//! let bytes = writer.into_inner()?.into_inner();
//! let reader = CdbReader::from_bytes(bytes)?;
//! let values: Vec<&[u8]> = reader.get_all(b"a").collect::<Result<_, _>>()?;
//! assert_eq!(values, [b"1", b"3"]);
//! # Ok::<(), hcdb::CdbError>(())
//! ```

use std::io::{Seek, SeekFrom, Write};

use binrw::BinWrite;
use tracing::{debug, trace};

use crate::error::{CdbError, CdbResult};
use crate::format::{
    HEADER_SIZE, Header, RECORD_HEADER_SIZE, RecordHeader, SLOT_SIZE, Slot, TABLE_COUNT,
    TablePointer,
};
use crate::hash::{bucket_of, hash, probe_start};

/// Largest offset addressable by the 32-bit format
const MAX_OFFSET: u64 = u32::MAX as u64;

/// Lifecycle of a writer
enum WriterState {
    /// Accepting records
    Building(Pending),
    /// Header written, no further changes possible
    Finalized,
    /// A write failed; the sink holds an unfinished database
    Poisoned,
}

/// Index information gathered while records are streamed
struct Pending {
    /// `(hash, offset)` of every record, grouped by bucket, in insertion order
    buckets: Vec<Vec<Slot>>,
    /// Next record offset, relative to the database origin
    position: u64,
}

/// Builder for constant database files
///
/// The writer is a two-state machine: `put` is only accepted while building,
/// `finish` moves it to the finalized state, and `into_inner` hands back the
/// sink only once the header is in place. Any I/O failure poisons the writer.
pub struct CdbWriter<W: Write + Seek> {
    sink: W,
    /// Stream position of the first header byte
    origin: u64,
    state: WriterState,
    records: u64,
}

impl<W: Write + Seek> CdbWriter<W> {
    /// Start a new database at the sink's current position
    ///
    /// Reserves the header by writing 256 zeroed table pointers.
    pub fn new(mut sink: W) -> CdbResult<Self> {
        let origin = sink.stream_position()?;
        Header::placeholder().write(&mut sink)?;

        Ok(Self {
            sink,
            origin,
            state: WriterState::Building(Pending {
                buckets: vec![Vec::new(); TABLE_COUNT],
                position: HEADER_SIZE as u64,
            }),
            records: 0,
        })
    }

    /// Append one record
    ///
    /// Keys need not be unique; every value stays retrievable.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> CdbResult<()> {
        let pending = match &mut self.state {
            WriterState::Building(pending) => pending,
            WriterState::Finalized => {
                return Err(CdbError::InvalidState(
                    "cannot add records to a finalized database".to_string(),
                ));
            }
            WriterState::Poisoned => return Err(poisoned()),
        };

        let position = pending.position;
        let end = position + RECORD_HEADER_SIZE as u64 + key.len() as u64 + value.len() as u64;
        if end > MAX_OFFSET {
            return Err(CdbError::DatabaseFull { required: end });
        }

        if let Err(err) = RecordHeader::write_record(&mut self.sink, key, value) {
            self.state = WriterState::Poisoned;
            return Err(err);
        }

        let slot = Slot {
            hash: hash(key),
            position: position as u32,
        };
        pending.buckets[bucket_of(slot.hash)].push(slot);
        pending.position = end;
        self.records += 1;
        Ok(())
    }

    /// Append every pair of an iterator, in order
    pub fn put_all<I, K, V>(&mut self, pairs: I) -> CdbResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (key, value) in pairs {
            self.put(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Write the bucket tables and the final header
    ///
    /// May only be called once.
    pub fn finish(&mut self) -> CdbResult<()> {
        let pending = match std::mem::replace(&mut self.state, WriterState::Poisoned) {
            WriterState::Building(pending) => pending,
            WriterState::Finalized => {
                self.state = WriterState::Finalized;
                return Err(CdbError::InvalidState(
                    "database is already finalized".to_string(),
                ));
            }
            WriterState::Poisoned => return Err(poisoned()),
        };

        let data_end = pending.position;
        let total = self.write_index(&pending)?;
        self.state = WriterState::Finalized;

        debug!(
            "Finalized database: {} records, {} data bytes, {} total bytes",
            self.records,
            data_end - HEADER_SIZE as u64,
            total
        );
        Ok(())
    }

    /// Append the 256 tables, rewrite the header, return the database size
    fn write_index(&mut self, pending: &Pending) -> CdbResult<u64> {
        let mut header = Header::placeholder();
        let mut position = pending.position;

        for (bucket, entries) in pending.buckets.iter().enumerate() {
            let table = build_table(entries)?;
            let end = position + (table.len() * SLOT_SIZE) as u64;
            if end > MAX_OFFSET {
                return Err(CdbError::DatabaseFull { required: end });
            }

            for slot in &table {
                slot.write(&mut self.sink)?;
            }
            header.tables[bucket] = TablePointer {
                position: position as u32,
                slots: table.len() as u32,
            };
            trace!(
                "bucket {:3}: {} records in {} slots at {}",
                bucket,
                entries.len(),
                table.len(),
                position
            );
            position = end;
        }

        self.sink.seek(SeekFrom::Start(self.origin))?;
        header.write(&mut self.sink)?;
        self.sink.seek(SeekFrom::Start(self.origin + position))?;
        self.sink.flush()?;

        Ok(position)
    }

    /// Number of records added so far
    pub fn len(&self) -> u64 {
        self.records
    }

    /// Check if no record has been added
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Check if the header has been written
    pub fn is_finalized(&self) -> bool {
        matches!(self.state, WriterState::Finalized)
    }

    /// Get a reference to the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Recover the sink of a finalized database
    pub fn into_inner(self) -> CdbResult<W> {
        match self.state {
            WriterState::Finalized => Ok(self.sink),
            WriterState::Building(_) => Err(CdbError::InvalidState(
                "database must be finished before releasing its sink".to_string(),
            )),
            WriterState::Poisoned => Err(poisoned()),
        }
    }
}

fn poisoned() -> CdbError {
    CdbError::InvalidState("writer is unusable after a failed write".to_string())
}

/// Lay out one bucket table
///
/// The table has twice as many slots as entries (at least one). Entries are
/// placed in the given order at `(hash >> 8) % len`, moving forward with
/// wraparound past occupied slots, so a probe scan meets entries sharing a
/// start slot in insertion order.
pub fn build_table(entries: &[Slot]) -> CdbResult<Vec<Slot>> {
    let len = (entries.len() * 2).max(1);
    let slots = u32::try_from(len).map_err(|_| CdbError::DatabaseFull {
        required: (len * SLOT_SIZE) as u64,
    })?;
    let mut table = vec![Slot::default(); len];

    for entry in entries {
        let mut index = probe_start(entry.hash, slots) as usize;
        let mut probes = 1;
        while !table[index].is_empty() {
            if probes >= len {
                return Err(CdbError::InvalidState(format!(
                    "bucket table of {len} slots has no free slot"
                )));
            }
            index = (index + 1) % len;
            probes += 1;
        }
        table[index] = *entry;
    }

    Ok(table)
}
