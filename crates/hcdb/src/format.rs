//! On-disk structures of a constant database
//!
//! ```text
//! [0x0000] Header: 256 x TablePointer (8 bytes each)
//! [0x0800] Data:   RecordHeader + key + value, repeated
//! [ ... ]  Index:  256 tables of Slot, in bucket order
//! ```
//!
//! All integers are little-endian 32-bit. A slot whose data offset is zero is
//! empty; no record can live at offset zero because the header is there.

use std::io::{Cursor, Write};

use binrw::meta::ReadEndian;
use binrw::{BinRead, BinWrite};

use crate::error::{CdbError, CdbResult};

/// Number of bucket tables
pub const TABLE_COUNT: usize = 256;

/// Size of one table pointer in bytes
pub const POINTER_SIZE: usize = 8;

/// Size of the header in bytes (256 table pointers)
pub const HEADER_SIZE: usize = TABLE_COUNT * POINTER_SIZE;

/// Size of a record header (key length + value length)
pub const RECORD_HEADER_SIZE: usize = 8;

/// Size of one index slot in bytes
pub const SLOT_SIZE: usize = 8;

/// Location of one bucket table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct TablePointer {
    /// Offset of the first slot from the start of the database
    pub position: u32,
    /// Number of slots in the table
    pub slots: u32,
}

impl TablePointer {
    /// Byte offset just past the end of the table
    pub fn end(&self) -> u64 {
        u64::from(self.position) + u64::from(self.slots) * SLOT_SIZE as u64
    }
}

/// Fixed-size header holding the 256 table pointers
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Header {
    /// Table pointers, indexed by bucket
    #[br(count = TABLE_COUNT)]
    pub tables: Vec<TablePointer>,
}

impl Header {
    /// Header with every pointer zeroed, as written before finalization
    pub fn placeholder() -> Self {
        Self {
            tables: vec![TablePointer::default(); TABLE_COUNT],
        }
    }

    /// Decode the header from the start of a database image
    pub fn parse(data: &[u8]) -> CdbResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(CdbError::corrupt(format!(
                "file is {} bytes, shorter than the {HEADER_SIZE}-byte header",
                data.len()
            )));
        }
        Ok(Self::read(&mut Cursor::new(&data[..HEADER_SIZE]))?)
    }

    /// Check every table pointer against the size of the database
    ///
    /// Returns the end of the data region, which is where the first table
    /// starts.
    pub fn validate(&self, file_len: u64) -> CdbResult<u64> {
        let mut data_end = file_len;

        for (bucket, table) in self.tables.iter().enumerate() {
            if (table.position as usize) < HEADER_SIZE {
                return Err(CdbError::corrupt(format!(
                    "table {bucket} starts at {} inside the header (unfinished database?)",
                    table.position
                )));
            }
            if table.end() > file_len {
                return Err(CdbError::corrupt(format!(
                    "table {bucket} ends at {} past end of file ({file_len} bytes)",
                    table.end()
                )));
            }
            data_end = data_end.min(u64::from(table.position));
        }

        Ok(data_end)
    }
}

/// Length prefix of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RecordHeader {
    /// Key length in bytes
    pub key_len: u32,
    /// Value length in bytes
    pub value_len: u32,
}

impl RecordHeader {
    /// Total record size including this header
    pub fn record_size(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + u64::from(self.key_len) + u64::from(self.value_len)
    }

    /// Write the header followed by key and value
    pub fn write_record<W: Write + std::io::Seek>(
        writer: &mut W,
        key: &[u8],
        value: &[u8],
    ) -> CdbResult<()> {
        let header = Self {
            key_len: u32::try_from(key.len()).map_err(|_| CdbError::DatabaseFull {
                required: key.len() as u64,
            })?,
            value_len: u32::try_from(value.len()).map_err(|_| CdbError::DatabaseFull {
                required: value.len() as u64,
            })?,
        };
        header.write(writer)?;
        writer.write_all(key)?;
        writer.write_all(value)?;
        Ok(())
    }
}

/// One entry of a bucket table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Slot {
    /// Full 32-bit hash of the record key
    pub hash: u32,
    /// Offset of the record, zero for an empty slot
    pub position: u32,
}

impl Slot {
    /// Check if this slot terminates a probe sequence
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }
}

/// Decode a fixed-size structure at `offset`, bounded by `limit`
pub(crate) fn read_at<T>(data: &[u8], offset: u64, size: usize, limit: u64) -> CdbResult<T>
where
    T: ReadEndian + for<'a> BinRead<Args<'a> = ()>,
{
    let end = offset + size as u64;
    if end > limit || end > data.len() as u64 {
        return Err(CdbError::corrupt(format!(
            "{size}-byte structure at {offset} runs past {limit}"
        )));
    }
    let bytes = &data[offset as usize..end as usize];
    Ok(T::read(&mut Cursor::new(bytes))?)
}
