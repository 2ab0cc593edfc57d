//! Memory-mapped dataset: the fast path for files that fit addressable
//! memory.
//!
//! The data region is mapped read-only once at open. Logically the record
//! stream has axes `(time, variable, row, col, layer)` with layer varying
//! fastest; variable extraction walks those axes with direct offset
//! arithmetic into the mapping and copies the requested field out. Nothing
//! in the mapping is ever mutated, so concurrent read-only sharing needs no
//! locking.

use std::collections::HashMap;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};
use memmap2::Mmap;

use crate::pa::error::{PaError, Result};
use crate::pa::models::{FieldType, FileKind, Header, RecordSchema};
use crate::pa::record_file::decode;
use crate::pa::timetuple::{camx_to_ioapi, TimeLine};
use crate::pa::var::{
    self, LogicalVariable, VarSlot, VarValues, DIM_COL, DIM_DATETIME, DIM_LAY, DIM_ROW,
    DIM_TSTEP, DIM_VAR,
};
use crate::pa::open_parts;

#[derive(Debug)]
pub struct MappedDataset {
    header: Header,
    schema: RecordSchema,
    timeline: TimeLine,
    data_start: u64,
    /// `None` once the dataset is closed.
    map: Option<Mmap>,
    varkeys: Vec<String>,
    varmap: HashMap<String, VarSlot>,
    dims: Vec<(&'static str, usize)>,
}

impl MappedDataset {
    /// Opens a file and maps its data region.
    ///
    /// # Errors
    /// Any header, schema or size-law failure from the shared open path,
    /// plus I/O errors from the mapping itself.
    pub fn open(path: impl AsRef<Path>, kind: FileKind) -> Result<Self> {
        let parts = open_parts(path.as_ref(), kind)?;
        if parts.header.domains.len() > 1 {
            warn!(
                "{} domains declared; the mapped view addresses the first only",
                parts.header.domains.len()
            );
        }

        // Safety: the mapping is read-only and the file is opened read-only;
        // the single-writer assumption is the caller's.
        let map = unsafe { Mmap::map(parts.rf.file())? };

        let (varkeys, varmap) = var::build_varmap(&parts.header, &parts.schema);
        let domain = parts.header.active_domain();
        let dims = vec![
            (DIM_TSTEP, parts.timeline.nsteps),
            (DIM_COL, domain.ncols()),
            (DIM_ROW, domain.nrows()),
            (DIM_LAY, domain.nlays()),
            (DIM_VAR, varkeys.len()),
            (DIM_DATETIME, 2),
        ];

        Ok(Self {
            header: parts.header,
            schema: parts.schema,
            timeline: parts.timeline,
            data_start: parts.data_start,
            map: Some(map),
            varkeys,
            varmap,
            dims,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn time_step_count(&self) -> usize {
        self.timeline.nsteps
    }

    /// The inferred time step in `HHMM` form.
    pub fn step_hhmm(&self) -> f32 {
        self.timeline.step_hhmm()
    }

    pub fn dimensions(&self) -> &[(&'static str, usize)] {
        &self.dims
    }

    pub fn variables(&self) -> &[String] {
        &self.varkeys
    }

    /// Looks up a variable by name and extracts its values from the mapping.
    ///
    /// Resolution order: the precomputed `(field, species-or-reaction)` key
    /// map (which also covers bare field names at variable index 0), then
    /// the synthesized `TFLAG`. Anything else is `UnknownVariable`.
    pub fn variable(&self, name: &str) -> Result<LogicalVariable> {
        let map = self.map.as_ref().ok_or(PaError::ClosedDataset)?;
        match self.varmap.get(name) {
            None => Err(PaError::UnknownVariable(name.to_string())),
            Some(VarSlot::Tflag) => Ok(self.tflag(map)),
            Some(&VarSlot::Field { field, var }) => Ok(self.extract(map, name, field, var)),
        }
    }

    /// Releases the mapping. Idempotent; later lookups are `ClosedDataset`.
    pub fn close(&mut self) {
        if self.map.take().is_some() {
            debug!("released data mapping");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.map.is_none()
    }

    /// Byte offset of the physical record for `(timestep, variable, row
    /// index, col index, layer index)` in write order: variable outer, then
    /// row, then col, layer fastest.
    fn record_offset(&self, t: usize, v: usize, rj: usize, ci: usize, lk: usize) -> usize {
        let domain = self.header.active_domain();
        let (nrow, ncol, nlay) = (domain.nrows(), domain.ncols(), domain.nlays());
        let nvars = self.header.nvars_per_record();
        let rec = (((t * nvars + v) * nrow + rj) * ncol + ci) * nlay + lk;
        self.data_start as usize + rec * self.schema.padded_size as usize
    }

    fn extract(&self, map: &Mmap, name: &str, field: usize, var: usize) -> LogicalVariable {
        let domain = self.header.active_domain();
        let (nrow, ncol, nlay) = (domain.nrows(), domain.ncols(), domain.nlays());
        let nsteps = self.timeline.nsteps;
        let field_off = self.schema.field_offset(field) as usize;
        let ty = self.schema.fields[field].ty;
        let is_channel = self.schema.data_fields.contains(&field);

        let total = nsteps * nlay * nrow * ncol;
        let mut floats = Vec::new();
        let mut ints = Vec::new();
        let mut texts = Vec::new();
        match ty {
            FieldType::Float => floats.reserve(total),
            FieldType::Int => ints.reserve(total),
            FieldType::Text(_) => texts.reserve(total),
        }

        // Logical order (TSTEP, LAY, ROW, COL); physical order has layer
        // innermost, so this is a strided gather, not a straight copy.
        for t in 0..nsteps {
            for lk in 0..nlay {
                for rj in 0..nrow {
                    for ci in 0..ncol {
                        let at = self.record_offset(t, var, rj, ci, lk) + field_off;
                        match ty {
                            // from_bits keeps the uncomputed-cell sentinel
                            // (and any other NaN payload) bit-exact.
                            FieldType::Float => floats
                                .push(f32::from_bits(BigEndian::read_u32(&map[at..at + 4]))),
                            FieldType::Int => ints.push(BigEndian::read_i32(&map[at..at + 4])),
                            FieldType::Text(w) => texts.push(decode::read_text(map, at, w)),
                        }
                    }
                }
            }
        }

        let units = if is_channel {
            var::channel_units(self.header.kind).to_string()
        } else {
            String::new()
        };
        LogicalVariable {
            name: name.to_string(),
            units,
            long_name: var::long_name(name),
            dims: vec![DIM_TSTEP, DIM_LAY, DIM_ROW, DIM_COL],
            shape: vec![nsteps, nlay, nrow, ncol],
            values: match ty {
                FieldType::Float => VarValues::Float(floats),
                FieldType::Int => VarValues::Int(ints),
                FieldType::Text(_) => VarValues::Text(texts),
            },
        }
    }

    /// Synthesizes `TFLAG`: `(YYYYJJJ, HHMMSS)` per step boundary, per
    /// declared variable. Row 0 is the header start; the remaining rows are
    /// read from the `DATE`/`TIME` fields of each timestep's first record.
    fn tflag(&self, map: &Mmap) -> LogicalVariable {
        let nvar = self.varkeys.len().max(1);
        let nrows = self.timeline.nsteps + 1;
        let date_off = self.schema.field_offset(1) as usize;
        let time_off = self.schema.field_offset(2) as usize;

        let mut values = Vec::with_capacity(nrows * nvar * 2);
        for t in 0..nrows {
            let (date, time) = if t == 0 {
                self.timeline.boundary(0)
            } else {
                let at = self.record_offset(t - 1, 0, 0, 0, 0);
                (
                    BigEndian::read_i32(&map[at + date_off..at + date_off + 4]),
                    f32::from_bits(BigEndian::read_u32(&map[at + time_off..at + time_off + 4])),
                )
            };
            let (yyyyjjj, hhmmss) = camx_to_ioapi(date, time);
            for _ in 0..nvar {
                values.push(yyyyjjj);
                values.push(hhmmss);
            }
        }

        LogicalVariable {
            name: "TFLAG".to_string(),
            units: "<YYYYJJJ,HHMMSS>".to_string(),
            long_name: var::long_name("TFLAG"),
            dims: vec![DIM_TSTEP, DIM_VAR, DIM_DATETIME],
            shape: vec![nrows, nvar, 2],
            values: VarValues::Int(values),
        }
    }
}
