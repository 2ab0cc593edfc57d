//! # camx-pa-reader
//!
//! A reader for CAMx process-analysis output files: `ipr` (integrated
//! process rates, one record per species per cell) and `irr` (instantaneous
//! reaction rates, all reactions in one record per cell).
//!
//! Both kinds are big-endian Fortran unformatted sequential files: a
//! self-describing header followed by fixed-size data records, each framed
//! by 4-byte length guards. Two access strategies are provided:
//!
//! - [`MappedDataset`]: memory-maps the data region and extracts named
//!   variables by direct offset arithmetic (fast path).
//! - [`SeekingDataset`]: never maps the file; computes record offsets with
//!   closed-form nested strides and decodes incrementally in bounded memory.
pub mod pa;

// Re-export the main types for convenience
pub use pa::{
    error::{PaError, Result},
    iter::RecordKey,
    mapped::MappedDataset,
    models::{FileKind, Grid, Header, PaDomain, ProcessProfile, RecordSchema},
    seek::{Record, SeekingDataset},
    var::{LogicalVariable, VarValues, UNCOMPUTED_SENTINEL},
    AccessMode, Dataset,
};
