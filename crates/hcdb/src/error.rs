//! Error types for constant database operations

use thiserror::Error;

/// Constant database result type
pub type CdbResult<T> = Result<T, CdbError>;

/// Errors raised while building, reading or replacing a database
#[derive(Debug, Error)]
pub enum CdbError {
    /// I/O error from the underlying file or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    Binary(#[source] binrw::Error),

    /// Header, record or slot bounds are violated
    #[error("Corrupt database: {reason}")]
    CorruptFormat {
        /// Detailed description of the violated bound
        reason: String,
    },

    /// Writer used after finalization, or an internal invariant was broken
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The database would no longer be addressable with 32-bit offsets
    #[error("Database full: {required} bytes exceed the 4 GiB format limit")]
    DatabaseFull {
        /// Size in bytes the database would have needed
        required: u64,
    },

    /// Renaming the temporary file over the destination failed
    #[error("Failed to replace database: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl From<binrw::Error> for CdbError {
    fn from(err: binrw::Error) -> Self {
        match err {
            // Keep storage failures distinguishable from malformed data
            binrw::Error::Io(io) => Self::Io(io),
            other => Self::Binary(other),
        }
    }
}

impl CdbError {
    /// Shorthand for a [`CdbError::CorruptFormat`] error
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptFormat {
            reason: reason.into(),
        }
    }

    /// Check if this error means the database contents cannot be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptFormat { .. } | Self::Binary(_))
    }

    /// Check if this error came from the storage layer
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Persist(_))
    }

    /// Check if this error is a programming error rather than a runtime condition
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}
