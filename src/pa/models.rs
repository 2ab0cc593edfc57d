//! Core data structures for the CAMx process-analysis format.
//!
//! This module defines the domain model built once at open time:
//! - The parsed file [`Header`] (run message, time bounds, grids, domains,
//!   name lists)
//! - The derived [`RecordSchema`] describing one physical data record
//! - Kind and profile enumerations

use crate::pa::error::{PaError, Result};

/// The two CAMx process-analysis file kinds sharing the same record framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Integrated process rates: one record per species per cell, with one
    /// float channel per process.
    Ipr,
    /// Instantaneous reaction rates: one record per cell, with one float
    /// channel per reaction.
    Irr,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FileKind::Ipr => write!(f, "ipr"),
            FileKind::Irr => write!(f, "irr"),
        }
    }
}

/// One model grid descriptor from the header.
///
/// `iutm` is only present in irr-kind files (7-int grid records); ipr-kind
/// files write 6-int grid records.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    pub orgx: i32,
    pub orgy: i32,
    pub ncol: i32,
    pub nrow: i32,
    pub xsize: i32,
    pub ysize: i32,
    pub iutm: Option<i32>,
}

/// One process-analysis domain ("padomain"): the active 3-D subgrid over
/// which data records were written. Bounds are inclusive, 1-based model
/// cell indices.
#[derive(Debug, Clone, Copy)]
pub struct PaDomain {
    pub grid: i32,
    pub istart: i32,
    pub iend: i32,
    pub jstart: i32,
    pub jend: i32,
    pub blay: i32,
    pub tlay: i32,
}

impl PaDomain {
    pub fn ncols(&self) -> usize {
        (self.iend - self.istart + 1) as usize
    }

    pub fn nrows(&self) -> usize {
        (self.jend - self.jstart + 1) as usize
    }

    pub fn nlays(&self) -> usize {
        (self.tlay - self.blay + 1) as usize
    }

    /// Total cells in the domain.
    pub fn ncells(&self) -> usize {
        self.ncols() * self.nrows() * self.nlays()
    }

    pub(crate) fn validate(&self, index: usize) -> Result<()> {
        if self.iend < self.istart || self.jend < self.jstart || self.tlay < self.blay {
            return Err(PaError::HeaderCorrupt(format!(
                "domain {} has inverted bounds: i {}..{}, j {}..{}, k {}..{}",
                index, self.istart, self.iend, self.jstart, self.jend, self.blay, self.tlay
            )));
        }
        Ok(())
    }
}

/// Complete parsed header from a CAMx process-analysis file.
///
/// Immutable once built; everything downstream (schema, strides, timeline)
/// derives from this.
#[derive(Debug, Clone)]
pub struct Header {
    pub kind: FileKind,
    /// 80-character run message, trailing whitespace trimmed.
    pub run_message: String,
    /// Julian start date, YYJJJ.
    pub start_date: i32,
    /// Fractional start time, HHMM.
    pub start_time: f32,
    pub end_date: i32,
    pub end_time: f32,
    pub grids: Vec<Grid>,
    /// Species names (ipr only; empty for irr). 10-byte fixed-width fields,
    /// trailing whitespace trimmed.
    pub species: Vec<String>,
    pub domains: Vec<PaDomain>,
    /// Process names (ipr only; empty for irr). 25-byte fixed-width fields.
    pub processes: Vec<String>,
    /// Reaction count (irr only; 0 for ipr).
    pub nrxns: usize,
}

impl Header {
    /// The first declared domain; record addressing within a time step is
    /// defined relative to it.
    pub fn active_domain(&self) -> &PaDomain {
        &self.domains[0]
    }

    /// Number of logical per-record variables: species for ipr, a single
    /// record channel set for irr.
    pub fn nvars_per_record(&self) -> usize {
        match self.kind {
            FileKind::Ipr => self.species.len(),
            FileKind::Irr => 1,
        }
    }
}

/// The ipr process-channel profile, selected once at schema derivation and
/// carried as an explicit tag. Downstream lookups switch on this tag rather
/// than re-inspecting header state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessProfile {
    /// 24 channels: aerosol chemistry merged into a single `AERCHEM` term.
    AerchemMerged,
    /// 26 channels: `INORGACHEM`, `ORGACHEM`, `AQACHEM` split out.
    InorgOrgAqSplit,
}

/// Binary type of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Big-endian i32.
    Int,
    /// Big-endian IEEE-754 f32.
    Float,
    /// Fixed-width ASCII text of the given byte length.
    Text(usize),
}

impl FieldType {
    pub fn size(&self) -> u64 {
        match self {
            FieldType::Int | FieldType::Float => 4,
            FieldType::Text(n) => *n as u64,
        }
    }
}

/// One `(name, type)` entry of the physical record layout.
#[derive(Debug, Clone)]
pub struct RecordField {
    pub name: String,
    pub ty: FieldType,
}

/// Derived description of one physical data record, including the framing
/// guards (`SPAD` leading, `EPAD` trailing).
///
/// Immutable once derived; both decoders address records exclusively through
/// this schema, so their offset arithmetic cannot drift apart.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub kind: FileKind,
    /// Channel profile tag (ipr only).
    pub profile: Option<ProcessProfile>,
    /// All fields in physical order: `SPAD`, identification fields, data
    /// channels, `EPAD`.
    pub fields: Vec<RecordField>,
    /// Indices into `fields` of the float data channels.
    pub data_fields: std::ops::Range<usize>,
    /// Record payload size in bytes (without the two 4-byte guards).
    pub record_size: u64,
    /// Physical record size including both guards.
    pub padded_size: u64,
    /// Records written per timestep for the active domain (includes the
    /// species factor for ipr).
    pub records_per_step: u64,
}

impl RecordSchema {
    /// Byte offset of a field from the start of the padded record
    /// (the `SPAD` guard is at offset 0).
    pub fn field_offset(&self, field_idx: usize) -> u64 {
        self.fields[..field_idx].iter().map(|f| f.ty.size()).sum()
    }

    /// Byte offset of a field within the record payload, or `None` for the
    /// framing guards themselves.
    pub fn payload_offset(&self, field_idx: usize) -> Option<u64> {
        if field_idx == 0 || field_idx == self.fields.len() - 1 {
            return None;
        }
        Some(self.field_offset(field_idx) - 4)
    }

    /// Index of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of float data channels per record.
    pub fn n_channels(&self) -> usize {
        self.data_fields.len()
    }

    /// Names of the float data channels, in record order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.fields[self.data_fields.clone()]
            .iter()
            .map(|f| f.name.as_str())
    }
}
