//! Seek-based dataset: bounded-memory access for files too large to map.
//!
//! Never maps the file. Record positions come from closed-form nested
//! strides (k fastest, then i, then j, then timestep, then domain); bulk
//! reads walk the space in write order and verify the identification fields
//! of every decoded record against the position the arithmetic implies.
//! A mismatch is a fatal [`LayoutDesync`](crate::pa::error::PaError) — it
//! means the schema or stride computation is wrong, so the whole read is
//! abandoned rather than returning partially-correct arrays.

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use crate::pa::error::{PaError, Result};
use crate::pa::iter::KeysIterator;
use crate::pa::layout::DomainStrides;
use crate::pa::models::{FieldType, FileKind, Header, RecordSchema};
use crate::pa::open_parts;
use crate::pa::record_file::{decode, RecordFile};
use crate::pa::timetuple::{camx_to_ioapi, TimeLine};
use crate::pa::var::{
    self, LogicalVariable, VarSlot, VarValues, DIM_COL, DIM_DATETIME, DIM_LAY, DIM_ROW,
    DIM_TSTEP, DIM_VAR,
};

/// Channels fetched per batch when a single variable is requested; the
/// window is always clamped to the actual channel count.
const BATCH_CHANNELS: usize = 30;

/// Payload byte offsets of the identification fields, precomputed from the
/// schema once at open.
#[derive(Debug, Clone, Copy)]
struct IdOffsets {
    date: usize,
    time: usize,
    spc: Option<usize>,
    pagrid: usize,
    nest: usize,
    i: usize,
    j: usize,
    k: usize,
    /// Offset of the first data channel; channels are consecutive floats.
    channels: usize,
}

impl IdOffsets {
    fn new(schema: &RecordSchema) -> Self {
        // Payload layout is fixed per kind: DATE TIME [SPC] PAGRID NEST I J K
        // followed by the data channels.
        match schema.kind {
            FileKind::Ipr => Self {
                date: 0,
                time: 4,
                spc: Some(8),
                pagrid: 18,
                nest: 22,
                i: 26,
                j: 30,
                k: 34,
                channels: 38,
            },
            FileKind::Irr => Self {
                date: 0,
                time: 4,
                spc: None,
                pagrid: 8,
                nest: 12,
                i: 16,
                j: 20,
                k: 24,
                channels: 28,
            },
        }
    }
}

/// One decoded physical record.
#[derive(Debug, Clone)]
pub struct Record {
    pub date: i32,
    pub time: f32,
    /// Species name (ipr records only).
    pub species: Option<String>,
    pub pagrid: i32,
    pub nest: i32,
    pub i: i32,
    pub j: i32,
    pub k: i32,
    /// All data channels of the record, in schema order.
    pub values: Vec<f32>,
}

#[derive(Debug)]
pub struct SeekingDataset {
    /// `None` once the dataset is closed.
    rf: Option<RecordFile>,
    header: Header,
    schema: RecordSchema,
    timeline: TimeLine,
    data_start: u64,
    ids: IdOffsets,
    varkeys: Vec<String>,
    varmap: HashMap<String, VarSlot>,
    dims: Vec<(&'static str, usize)>,
    cache: HashMap<String, LogicalVariable>,
}

impl SeekingDataset {
    pub fn open(path: impl AsRef<Path>, kind: FileKind) -> Result<Self> {
        let parts = open_parts(path.as_ref(), kind)?;
        let ids = IdOffsets::new(&parts.schema);
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
            rf: Some(parts.rf),
            header: parts.header,
            schema: parts.schema,
            timeline: parts.timeline,
            data_start: parts.data_start,
            ids,
            varkeys,
            varmap,
            dims,
            cache: HashMap::new(),
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

    /// Closes the underlying file. Idempotent; later operations are
    /// `ClosedDataset`.
    pub fn close(&mut self) {
        if self.rf.take().is_some() {
            debug!("closed record file");
        }
        self.cache.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.rf.is_none()
    }

    fn check_domain(&self, domain: usize) -> Result<()> {
        if domain >= self.header.domains.len() {
            return Err(PaError::IndexOutOfRange {
                what: "domain",
                index: domain,
                count: self.header.domains.len(),
            });
        }
        Ok(())
    }

    fn check_species(&self, species: usize) -> Result<()> {
        if species >= self.header.nvars_per_record() {
            return Err(PaError::IndexOutOfRange {
                what: "species",
                index: species,
                count: self.header.nvars_per_record(),
            });
        }
        Ok(())
    }

    /// Absolute record index for a fully-qualified position. Earlier domains
    /// contribute their complete time-series block; within a domain the
    /// strides nest as timestep, then variable, then j, then i, then k.
    fn record_index(
        &self,
        domain_idx: usize,
        var: usize,
        tstep: usize,
        i: i32,
        j: i32,
        k: i32,
    ) -> u64 {
        let nvars = self.header.nvars_per_record() as u64;
        let nsteps = self.timeline.nsteps as u64;
        let mut records: u64 = self.header.domains[..domain_idx]
            .iter()
            .map(|d| nsteps * nvars * d.ncells() as u64)
            .sum();
        let domain = &self.header.domains[domain_idx];
        let strides = DomainStrides::new(domain);
        records += tstep as u64 * nvars * strides.n_j;
        records += var as u64 * strides.n_j;
        records += strides.cell_offset(domain, i, j, k);
        records
    }

    /// Repositions the cursor at the record for `(domain, date, time, i, j,
    /// k)`. The timestep comes from exact stamp lookup; no interpolation.
    ///
    /// # Errors
    /// `TimeNotFound` if the stamp is not in the enumerated range;
    /// `IndexOutOfRange` for a domain index past the declared list.
    pub fn seek(&mut self, domain: usize, date: i32, time: f32, i: i32, j: i32, k: i32) -> Result<()> {
        self.seek_species(domain, 0, date, time, i, j, k)
    }

    /// Like [`seek`](Self::seek) with an explicit species index (ipr files
    /// interleave one record per species per cell).
    pub fn seek_species(
        &mut self,
        domain: usize,
        species: usize,
        date: i32,
        time: f32,
        i: i32,
        j: i32,
        k: i32,
    ) -> Result<()> {
        self.check_domain(domain)?;
        self.check_species(species)?;
        let tstep = self.timeline.index_of(date, time)?;
        let rec = self.record_index(domain, species, tstep, i, j, k);
        let pos = self.data_start + rec * self.schema.padded_size;
        self.rf
            .as_mut()
            .ok_or(PaError::ClosedDataset)?
            .seek_record(pos)
    }

    /// Decodes exactly one record at the cursor.
    pub fn read_one(&mut self) -> Result<Record> {
        let record_size = self.schema.record_size;
        let n_channels = self.schema.n_channels();
        let ids = self.ids;
        let rf = self.rf.as_mut().ok_or(PaError::ClosedDataset)?;
        let rec_no = rf.record_start().saturating_sub(self.data_start) / self.schema.padded_size;
        let payload = rf.read_record()?;
        if payload.len() as u64 != record_size {
            return Err(PaError::LayoutDesync {
                record: rec_no,
                expected: format!("{} byte payload", record_size),
                found: format!("{} bytes", payload.len()),
            });
        }
        Ok(Record {
            date: decode::read_i32(&payload, ids.date),
            time: decode::read_f32(&payload, ids.time),
            species: ids.spc.map(|off| decode::read_text(&payload, off, 10)),
            pagrid: decode::read_i32(&payload, ids.pagrid),
            nest: decode::read_i32(&payload, ids.nest),
            i: decode::read_i32(&payload, ids.i),
            j: decode::read_i32(&payload, ids.j),
            k: decode::read_i32(&payload, ids.k),
            values: (0..n_channels)
                .map(|c| decode::read_f32(&payload, ids.channels + 4 * c))
                .collect(),
        })
    }

    /// Fresh lazy iterator over every `(domain, date, time, i, j, k)` key of
    /// one domain, in write order.
    ///
    /// # Errors
    /// `IndexOutOfRange` for a domain index past the declared list.
    pub fn iterate_keys(&self, domain: usize) -> Result<KeysIterator> {
        self.check_domain(domain)?;
        Ok(KeysIterator::new(
            domain,
            self.header.domains[domain],
            self.timeline.clone(),
        ))
    }

    /// Decodes the channel window `[start_channel, start_channel + count)`
    /// (clamped to the actual channel count) across the full time × space
    /// extent of the first domain, one `LogicalVariable` per channel.
    pub fn read_batch(&mut self, start_channel: usize, count: usize) -> Result<Vec<LogicalVariable>> {
        self.batch(0, start_channel, count)
    }

    /// ipr variant of [`read_batch`](Self::read_batch): decode the window
    /// for one species.
    ///
    /// # Errors
    /// `IndexOutOfRange` for a species index past the declared list.
    pub fn read_batch_species(
        &mut self,
        species: usize,
        start_channel: usize,
        count: usize,
    ) -> Result<Vec<LogicalVariable>> {
        self.check_species(species)?;
        self.batch(species, start_channel, count)
    }

    fn batch(&mut self, var: usize, start_channel: usize, count: usize) -> Result<Vec<LogicalVariable>> {
        let n = self.schema.n_channels();
        if start_channel >= n {
            return Err(PaError::UnknownVariable(format!(
                "data channel {} of {}",
                start_channel, n
            )));
        }
        let end = (start_channel + count).min(n);
        let width = end - start_channel;

        let domain = *self.header.active_domain();
        let (nrow, ncol, nlay) = (domain.nrows(), domain.ncols(), domain.nlays());
        let nsteps = self.timeline.nsteps;
        let ids = self.ids;
        let mut bufs = vec![vec![0f32; nsteps * nlay * nrow * ncol]; width];

        self.scan(var, |t, lk, rj, ci, payload| {
            let at = ((t * nlay + lk) * nrow + rj) * ncol + ci;
            for (w, buf) in bufs.iter_mut().enumerate() {
                buf[at] = decode::read_f32(payload, ids.channels + 4 * (start_channel + w));
            }
        })?;

        let units = var::channel_units(self.header.kind).to_string();
        let mut out = Vec::with_capacity(width);
        for (w, buf) in bufs.into_iter().enumerate() {
            let field = &self.schema.fields[self.schema.data_fields.start + start_channel + w];
            let name = match self.header.kind {
                FileKind::Ipr => format!("{}_{}", field.name, self.header.species[var]),
                FileKind::Irr => field.name.clone(),
            };
            out.push(LogicalVariable {
                long_name: var::long_name(&name),
                name,
                units: units.clone(),
                dims: vec![DIM_TSTEP, DIM_LAY, DIM_ROW, DIM_COL],
                shape: vec![nsteps, nlay, nrow, ncol],
                values: VarValues::Float(buf),
            });
        }
        Ok(out)
    }

    /// Walks the full `(time, j, i, k)` space of the first domain for one
    /// variable index, verifying every record's identification fields
    /// against the iteration position before handing its payload to `visit`.
    fn scan<F>(&mut self, var: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, usize, usize, usize, &[u8]),
    {
        let domain = *self.header.active_domain();
        let nsteps = self.timeline.nsteps;
        let ids = self.ids;
        let record_size = self.schema.record_size;
        let padded = self.schema.padded_size;
        let data_start = self.data_start;
        let stamps: Vec<(i32, f32)> = self.timeline.stamps().collect();
        let step_starts: Vec<u64> = (0..nsteps)
            .map(|t| {
                data_start
                    + self.record_index(0, var, t, domain.istart, domain.jstart, domain.blay)
                        * padded
            })
            .collect();
        let expected_spc = match self.header.kind {
            FileKind::Ipr => Some(self.header.species[var].clone()),
            FileKind::Irr => None,
        };

        let rf = self.rf.as_mut().ok_or(PaError::ClosedDataset)?;
        for (t, &(date, time)) in stamps.iter().enumerate() {
            rf.seek_record(step_starts[t])?;
            let mut rec_no = (step_starts[t] - data_start) / padded;
            for (rj, j) in (domain.jstart..=domain.jend).enumerate() {
                for (ci, i) in (domain.istart..=domain.iend).enumerate() {
                    for (lk, k) in (domain.blay..=domain.tlay).enumerate() {
                        let payload = rf.read_record()?;
                        if payload.len() as u64 != record_size {
                            return Err(PaError::LayoutDesync {
                                record: rec_no,
                                expected: format!("{} byte payload", record_size),
                                found: format!("{} bytes", payload.len()),
                            });
                        }
                        let got_date = decode::read_i32(&payload, ids.date);
                        let got_time = decode::read_f32(&payload, ids.time);
                        let got_i = decode::read_i32(&payload, ids.i);
                        let got_j = decode::read_i32(&payload, ids.j);
                        let got_k = decode::read_i32(&payload, ids.k);
                        let spc_ok = match (&expected_spc, ids.spc) {
                            (Some(want), Some(off)) => {
                                decode::read_text(&payload, off, 10) == *want
                            }
                            _ => true,
                        };
                        if got_date != date
                            || got_time != time
                            || got_i != i
                            || got_j != j
                            || got_k != k
                            || !spc_ok
                        {
                            return Err(PaError::LayoutDesync {
                                record: rec_no,
                                expected: format!(
                                    "date {} time {} i {} j {} k {}",
                                    date, time, i, j, k
                                ),
                                found: format!(
                                    "date {} time {} i {} j {} k {}",
                                    got_date, got_time, got_i, got_j, got_k
                                ),
                            });
                        }
                        visit(t, lk, rj, ci, &payload);
                        rec_no += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Looks up a variable by name, batching and caching channel decodes.
    ///
    /// irr channel requests fetch a window of [`BATCH_CHANNELS`] channels in
    /// one pass over the file and cache all of them; ipr requests decode the
    /// single `(process, species)` pair. Identification fields resolve at
    /// variable index 0; `TFLAG` is synthesized from the timeline.
    pub fn variable(&mut self, name: &str) -> Result<LogicalVariable> {
        if self.is_closed() {
            return Err(PaError::ClosedDataset);
        }
        if let Some(v) = self.cache.get(name) {
            return Ok(v.clone());
        }
        let slot = *self
            .varmap
            .get(name)
            .ok_or_else(|| PaError::UnknownVariable(name.to_string()))?;
        let built = match slot {
            VarSlot::Tflag => self.tflag(),
            VarSlot::Field { field, var } => {
                if self.schema.data_fields.contains(&field) {
                    let channel = field - self.schema.data_fields.start;
                    let fetched = match self.header.kind {
                        FileKind::Irr => self.batch(0, channel, BATCH_CHANNELS)?,
                        FileKind::Ipr => self.batch(var, channel, 1)?,
                    };
                    for v in fetched {
                        self.cache.insert(v.name.clone(), v);
                    }
                    return self
                        .cache
                        .get(name)
                        .cloned()
                        .ok_or_else(|| PaError::UnknownVariable(name.to_string()));
                }
                self.extract_id(field, var, name)?
            }
        };
        self.cache.insert(name.to_string(), built.clone());
        Ok(built)
    }

    /// Decodes an identification field over the full extent, broadcast at
    /// one variable index.
    fn extract_id(&mut self, field: usize, var: usize, name: &str) -> Result<LogicalVariable> {
        let domain = *self.header.active_domain();
        let (nrow, ncol, nlay) = (domain.nrows(), domain.ncols(), domain.nlays());
        let nsteps = self.timeline.nsteps;
        let ty = self.schema.fields[field].ty;
        // The framing guards sit outside the payload; scan has already
        // verified the payload length they carry, so their decoded value is
        // the record size.
        let guard_value = match self.schema.payload_offset(field) {
            Some(_) => None,
            None => Some(self.schema.record_size as i32),
        };
        let off = self.schema.payload_offset(field).unwrap_or(0) as usize;

        let total = nsteps * nlay * nrow * ncol;
        let mut floats = Vec::new();
        let mut ints = Vec::new();
        let mut texts = Vec::new();
        match ty {
            FieldType::Float => floats = vec![0f32; total],
            FieldType::Int => ints = vec![0i32; total],
            FieldType::Text(_) => texts = vec![String::new(); total],
        }
        self.scan(var, |t, lk, rj, ci, payload| {
            let at = ((t * nlay + lk) * nrow + rj) * ncol + ci;
            match ty {
                FieldType::Float => floats[at] = decode::read_f32(payload, off),
                FieldType::Int => {
                    ints[at] = guard_value.unwrap_or_else(|| decode::read_i32(payload, off))
                }
                FieldType::Text(w) => texts[at] = decode::read_text(payload, off, w),
            }
        })?;

        Ok(LogicalVariable {
            name: name.to_string(),
            units: String::new(),
            long_name: var::long_name(name),
            dims: vec![DIM_TSTEP, DIM_LAY, DIM_ROW, DIM_COL],
            shape: vec![nsteps, nlay, nrow, ncol],
            values: match ty {
                FieldType::Float => VarValues::Float(floats),
                FieldType::Int => VarValues::Int(ints),
                FieldType::Text(_) => VarValues::Text(texts),
            },
        })
    }

    /// `TFLAG` over the step boundaries, straight from the timeline.
    fn tflag(&self) -> LogicalVariable {
        let nvar = self.varkeys.len().max(1);
        let nrows = self.timeline.nsteps + 1;
        let mut values = Vec::with_capacity(nrows * nvar * 2);
        for idx in 0..nrows {
            let (date, time) = self.timeline.boundary(idx);
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
