//! Constant database reader
//!
//! A reader works on any byte container: a memory-mapped file
//! ([`CdbReader::open`]), a buffer read from a stream
//! ([`CdbReader::from_reader`]) or plain bytes ([`CdbReader::from_bytes`]).
//! Lookups borrow values straight from the container, never copy them, and
//! never mutate the reader, so a reader can be shared between threads.
//!
//! # Lookup
//!
//! ```text
//! h = hash(key)
//! table = header[h & 0xff]
//! slot  = (h >> 8) % table.slots, then +1 with wraparound
//! stop at the first empty slot (data offset 0) or after table.slots probes
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{CdbError, CdbResult};
use crate::format::{
    HEADER_SIZE, Header, RECORD_HEADER_SIZE, RecordHeader, SLOT_SIZE, Slot, TablePointer,
    read_at,
};
use crate::hash::{bucket_of, hash, probe_start};

/// Read-only view of a finished constant database
#[derive(Debug)]
pub struct CdbReader<B: AsRef<[u8]>> {
    data: B,
    header: Header,
    /// End of the data region (start of the first bucket table)
    data_end: u64,
}

impl CdbReader<Mmap> {
    /// Memory-map a database file
    pub fn open<P: AsRef<Path>>(path: P) -> CdbResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_SIZE as u64 {
            return Err(CdbError::corrupt(format!(
                "{} is {len} bytes, shorter than the {HEADER_SIZE}-byte header",
                path.display()
            )));
        }

        // SAFETY: the mapping is read-only. Databases are never modified in
        // place; updates write a new file and rename it over the old path,
        // which leaves this mapping pointing at the old inode.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        debug!("Opened database {} ({} bytes)", path.display(), len);
        Self::from_bytes(mmap)
    }
}

impl CdbReader<Vec<u8>> {
    /// Read a whole database from a stream such as stdin
    pub fn from_reader<R: Read>(mut reader: R) -> CdbResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }
}

impl<B: AsRef<[u8]>> CdbReader<B> {
    /// Validate the header and wrap a database image
    pub fn from_bytes(data: B) -> CdbResult<Self> {
        let bytes = data.as_ref();
        let header = Header::parse(bytes)?;
        let data_end = header.validate(bytes.len() as u64)?;

        Ok(Self {
            data,
            header,
            data_end,
        })
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// First value stored under `key`
    pub fn get(&self, key: &[u8]) -> CdbResult<Option<&[u8]>> {
        self.get_all(key).next().transpose()
    }

    /// Every value stored under `key`, in insertion order
    ///
    /// The iterator is lazy; calling `get_all` again starts a fresh scan.
    pub fn get_all<'r, 'k>(&'r self, key: &'k [u8]) -> Values<'r, 'k, B> {
        let hash = hash(key);
        let table = self.header.tables[bucket_of(hash)];
        let next = if table.slots == 0 {
            0
        } else {
            probe_start(hash, table.slots)
        };

        Values {
            reader: self,
            key,
            hash,
            table,
            next,
            remaining: table.slots,
        }
    }

    /// Check if at least one record has this key
    pub fn contains(&self, key: &[u8]) -> CdbResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All records in the order they were written
    pub fn iter(&self) -> Records<'_, B> {
        Records {
            reader: self,
            position: HEADER_SIZE as u64,
            failed: false,
        }
    }

    /// Keys of all records in the order they were written, duplicates included
    pub fn keys(&self) -> impl Iterator<Item = CdbResult<&[u8]>> + '_ {
        self.iter().map(|record| record.map(|(key, _)| key))
    }

    /// Number of records
    ///
    /// Every table holds twice as many slots as records, so this needs no scan.
    pub fn len(&self) -> u64 {
        self.header
            .tables
            .iter()
            .map(|table| u64::from(table.slots / 2))
            .sum()
    }

    /// Check if the database holds no record
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the database image in bytes
    pub fn size(&self) -> u64 {
        self.bytes().len() as u64
    }

    /// Release the reader and return the backing container
    pub fn into_inner(self) -> B {
        self.data
    }

    fn slot_at(&self, table: &TablePointer, index: u32) -> CdbResult<Slot> {
        let offset = u64::from(table.position) + u64::from(index) * SLOT_SIZE as u64;
        read_at(self.bytes(), offset, SLOT_SIZE, table.end())
    }

    /// Decode the record at `position`, returning key and value
    fn record_at(&self, position: u64) -> CdbResult<(&[u8], &[u8], u64)> {
        if position < HEADER_SIZE as u64 {
            return Err(CdbError::corrupt(format!(
                "record offset {position} points into the header"
            )));
        }

        let header: RecordHeader =
            read_at(self.bytes(), position, RECORD_HEADER_SIZE, self.data_end)?;
        let end = position + header.record_size();
        if end > self.data_end {
            return Err(CdbError::corrupt(format!(
                "record at {position} ends at {end}, past the data region ({})",
                self.data_end
            )));
        }

        let key_start = (position as usize) + RECORD_HEADER_SIZE;
        let value_start = key_start + header.key_len as usize;
        let bytes = self.bytes();
        Ok((
            &bytes[key_start..value_start],
            &bytes[value_start..end as usize],
            end,
        ))
    }
}

impl<'r, B: AsRef<[u8]>> IntoIterator for &'r CdbReader<B> {
    type Item = CdbResult<(&'r [u8], &'r [u8])>;
    type IntoIter = Records<'r, B>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Values of one key, produced by [`CdbReader::get_all`]
#[derive(Debug)]
pub struct Values<'r, 'k, B: AsRef<[u8]>> {
    reader: &'r CdbReader<B>,
    key: &'k [u8],
    hash: u32,
    table: TablePointer,
    next: u32,
    /// Probes left before the whole table has been visited
    remaining: u32,
}

impl<'r, B: AsRef<[u8]>> Values<'r, '_, B> {
    fn probe(&mut self) -> CdbResult<Option<&'r [u8]>> {
        while self.remaining > 0 {
            let slot = self.reader.slot_at(&self.table, self.next)?;
            self.remaining -= 1;
            self.next = (self.next + 1) % self.table.slots;

            if slot.is_empty() {
                self.remaining = 0;
                break;
            }
            if slot.hash == self.hash {
                let (key, value, _) = self.reader.record_at(u64::from(slot.position))?;
                if key == self.key {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }
}

impl<'r, B: AsRef<[u8]>> Iterator for Values<'r, '_, B> {
    type Item = CdbResult<&'r [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.probe() {
            Ok(value) => value.map(Ok),
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }
}

/// All records in physical order, produced by [`CdbReader::iter`]
#[derive(Debug)]
pub struct Records<'r, B: AsRef<[u8]>> {
    reader: &'r CdbReader<B>,
    position: u64,
    failed: bool,
}

impl<'r, B: AsRef<[u8]>> Iterator for Records<'r, B> {
    type Item = CdbResult<(&'r [u8], &'r [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.reader.data_end {
            return None;
        }

        match self.reader.record_at(self.position) {
            Ok((key, value, end)) => {
                self.position = end;
                Some(Ok((key, value)))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
