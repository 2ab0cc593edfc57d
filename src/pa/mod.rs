//! Core CAMx process-analysis reader module.

pub mod error;
pub mod header;
pub mod iter;
pub mod layout;
pub mod mapped;
pub mod models;
pub mod record_file;
pub mod seek;
pub mod timetuple;
pub mod var;

use std::path::Path;

use log::{info, warn};

pub use error::{PaError, Result};
pub use iter::RecordKey;
pub use mapped::MappedDataset;
pub use models::FileKind;
pub use seek::SeekingDataset;

use models::{Header, RecordSchema};
use record_file::{decode, RecordFile};
use timetuple::TimeLine;
use var::LogicalVariable;

/// Access strategy for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Map the whole data region; random access via offset arithmetic into
    /// the mapping. Fast when the file fits addressable memory.
    Mapped,
    /// Seek-based incremental decode in bounded memory; preferred for very
    /// large files or to avoid mapping overhead.
    Seeking,
}

/// A process-analysis dataset opened with either access strategy.
#[derive(Debug)]
pub enum Dataset {
    Mapped(MappedDataset),
    Seeking(SeekingDataset),
}

impl Dataset {
    pub fn open(path: impl AsRef<Path>, kind: FileKind, mode: AccessMode) -> Result<Self> {
        match mode {
            AccessMode::Mapped => MappedDataset::open(path, kind).map(Dataset::Mapped),
            AccessMode::Seeking => SeekingDataset::open(path, kind).map(Dataset::Seeking),
        }
    }

    /// Named dimension extents: `TSTEP`, `COL`, `ROW`, `LAY`, `VAR`,
    /// `DATE-TIME`.
    pub fn dimensions(&self) -> &[(&'static str, usize)] {
        match self {
            Dataset::Mapped(d) => d.dimensions(),
            Dataset::Seeking(d) => d.dimensions(),
        }
    }

    /// Declared variable keys (the `VAR` dimension).
    pub fn variables(&self) -> &[String] {
        match self {
            Dataset::Mapped(d) => d.variables(),
            Dataset::Seeking(d) => d.variables(),
        }
    }

    pub fn variable(&mut self, name: &str) -> Result<LogicalVariable> {
        match self {
            Dataset::Mapped(d) => d.variable(name),
            Dataset::Seeking(d) => d.variable(name),
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Dataset::Mapped(d) => d.header(),
            Dataset::Seeking(d) => d.header(),
        }
    }

    pub fn time_step_count(&self) -> usize {
        match self {
            Dataset::Mapped(d) => d.time_step_count(),
            Dataset::Seeking(d) => d.time_step_count(),
        }
    }

    /// The inferred time step in `HHMM` form.
    pub fn step_hhmm(&self) -> f32 {
        match self {
            Dataset::Mapped(d) => d.step_hhmm(),
            Dataset::Seeking(d) => d.step_hhmm(),
        }
    }

    /// Releases the backing resources. Idempotent; later variable lookups
    /// fail with `ClosedDataset`.
    pub fn close(&mut self) {
        match self {
            Dataset::Mapped(d) => d.close(),
            Dataset::Seeking(d) => d.close(),
        }
    }
}

/// Everything both decoders share at open time.
pub(crate) struct OpenParts {
    pub rf: RecordFile,
    pub header: Header,
    pub schema: RecordSchema,
    pub timeline: TimeLine,
    pub data_start: u64,
}

/// Parses the header, derives the schema, infers the timeline and verifies
/// the size law. Both decoders open through here, so records-per-timestep
/// and padded record size are identical between them by construction.
pub(crate) fn open_parts(path: &Path, kind: FileKind) -> Result<OpenParts> {
    let mut rf = RecordFile::open(path)?;
    let header = header::parse(&mut rf, kind)?;
    let schema = layout::derive(&header)?;
    let data_start = rf.record_start();

    // The file's own framing is the first cross-check of the derived schema.
    let first_size = rf.peek_record_size()?;
    if first_size != schema.record_size {
        return Err(PaError::HeaderCorrupt(format!(
            "first data record is {} bytes, schema expects {}",
            first_size, schema.record_size
        )));
    }

    // Files do not declare their own step size; measure it from the second
    // record's stamp.
    if data_start + 2 * schema.padded_size > rf.file_size() {
        return Err(PaError::HeaderCorrupt(
            "file too short to infer the time step".to_string(),
        ));
    }
    rf.skip_record()?;
    let payload = rf.read_record()?;
    let stamp = (decode::read_i32(&payload, 0), decode::read_f32(&payload, 4));
    let timeline = TimeLine::infer(
        (header.start_date, header.start_time),
        (header.end_date, header.end_time),
        stamp,
    )?;

    // Size law: header geometry must account for every data byte.
    let cells: u64 = header.domains.iter().map(|d| d.ncells() as u64).sum();
    let total_records =
        timeline.nsteps as u64 * header.nvars_per_record() as u64 * cells;
    let expected = data_start + total_records * schema.padded_size;
    if rf.file_size() < expected {
        return Err(PaError::HeaderCorrupt(format!(
            "file is {} bytes but header geometry needs {}",
            rf.file_size(),
            expected
        )));
    }
    if rf.file_size() > expected {
        warn!(
            "{} trailing bytes beyond the last declared record",
            rf.file_size() - expected
        );
    }

    info!(
        "Opened {} file: {} timesteps of {} records ({} byte padded records)",
        kind, timeline.nsteps, schema.records_per_step, schema.padded_size
    );

    rf.seek_record(data_start)?;
    Ok(OpenParts {
        rf,
        header,
        schema,
        timeline,
        data_start,
    })
}
