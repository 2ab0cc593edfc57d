//! Custom error types for the camx-pa-reader crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Every variant is either a programming error or a data-integrity error;
/// none are transient, so no operation retries.
#[derive(Debug, Error)]
pub enum PaError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The header section is malformed or truncated. Fatal at open.
    #[error("Corrupt header: {0}")]
    HeaderCorrupt(String),

    /// The header declares a process-channel profile this reader does not
    /// recognize. Only the 24-channel (AERCHEM merged) and 26-channel
    /// (INORGACHEM/ORGACHEM/AQACHEM split) layouts exist.
    #[error("Unsupported process channel count: {0} (expected 24 or 26)")]
    UnsupportedProcessChannelCount(usize),

    /// A requested timestep is not in the file's enumerated time range.
    /// Fatal for that request only; the dataset stays usable.
    #[error("Time step ({date}, {time}) not in file time range")]
    TimeNotFound { date: i32, time: f32 },

    /// A variable name does not resolve to any field/species combination.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A species or domain index addresses past the header's declared lists.
    /// Fatal for that request only; the dataset stays usable.
    #[error("{what} index {index} out of range ({count} available)")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },

    /// Identification fields decoded from a record disagree with the
    /// position implied by the stride arithmetic. Indicates a wrong schema
    /// or stride computation, never a transient condition; the whole read
    /// operation is abandoned.
    #[error("Layout desync at record {record}: expected {expected}, decoded {found}")]
    LayoutDesync {
        record: u64,
        expected: String,
        found: String,
    },

    /// A sequential-record framing guard did not match, or a record body
    /// overran the file.
    #[error("Bad record framing at byte {offset}: leading guard {leading}, trailing guard {trailing}")]
    BadFraming {
        offset: u64,
        leading: u32,
        trailing: u32,
    },

    /// The dataset has been closed; its mapping is released and variable
    /// lookups are no longer valid.
    #[error("Dataset is closed")]
    ClosedDataset,
}

/// A convenience `Result` type alias using the crate's `PaError` type.
pub type Result<T> = std::result::Result<T, PaError>;
