//! Header parsing for CAMx process-analysis files.
//!
//! The header is a fixed sequence of sequential records: run message, time
//! bounds, then count-prefixed lists (grids, species, domains, processes for
//! ipr; grids, domains, reaction count for irr). Every count-prefixed list
//! follows the same micro-protocol: one single-int record holding N, then N
//! fixed-shape records.

use log::{debug, info};

use crate::pa::error::{PaError, Result};
use crate::pa::models::{FileKind, Grid, Header, PaDomain};
use crate::pa::record_file::{decode, RecordFile, PAD_OVERHEAD};

const RUN_MESSAGE_LEN: usize = 80;
const SPECIES_NAME_LEN: usize = 10;
const PROCESS_NAME_LEN: usize = 25;

/// Parses the header, leaving the cursor at the first data record.
///
/// # Errors
/// Returns `HeaderCorrupt` if any record is shorter than its declared shape,
/// any list count is negative, or a count is implausibly large for the bytes
/// remaining in the file.
pub fn parse(rf: &mut RecordFile, kind: FileKind) -> Result<Header> {
    info!("Parsing {} header", kind);

    let run_message = decode::read_text(&record(rf, RUN_MESSAGE_LEN, "run message")?, 0, RUN_MESSAGE_LEN);

    let bounds = record(rf, 16, "time bounds")?;
    let start_date = decode::read_i32(&bounds, 0);
    let start_time = decode::read_f32(&bounds, 4);
    let end_date = decode::read_i32(&bounds, 8);
    let end_time = decode::read_f32(&bounds, 12);

    let grid_ints = match kind {
        FileKind::Ipr => 6,
        FileKind::Irr => 7,
    };
    let ngrids = count(rf, 4 * grid_ints, "grid list")?;
    let mut grids = Vec::with_capacity(ngrids);
    for _ in 0..ngrids {
        let p = record(rf, 4 * grid_ints, "grid descriptor")?;
        grids.push(Grid {
            orgx: decode::read_i32(&p, 0),
            orgy: decode::read_i32(&p, 4),
            ncol: decode::read_i32(&p, 8),
            nrow: decode::read_i32(&p, 12),
            xsize: decode::read_i32(&p, 16),
            ysize: decode::read_i32(&p, 20),
            iutm: match kind {
                FileKind::Irr => Some(decode::read_i32(&p, 24)),
                FileKind::Ipr => None,
            },
        });
    }

    let mut species = Vec::new();
    if kind == FileKind::Ipr {
        let nspec = count(rf, SPECIES_NAME_LEN, "species list")?;
        for _ in 0..nspec {
            let p = record(rf, SPECIES_NAME_LEN, "species name")?;
            species.push(decode::read_text(&p, 0, SPECIES_NAME_LEN));
        }
        if species.is_empty() {
            return Err(PaError::HeaderCorrupt("species list is empty".to_string()));
        }
    }

    let ndomains = count(rf, 28, "domain list")?;
    let mut domains = Vec::with_capacity(ndomains);
    for idx in 0..ndomains {
        let p = record(rf, 28, "domain descriptor")?;
        let domain = PaDomain {
            grid: decode::read_i32(&p, 0),
            istart: decode::read_i32(&p, 4),
            iend: decode::read_i32(&p, 8),
            jstart: decode::read_i32(&p, 12),
            jend: decode::read_i32(&p, 16),
            blay: decode::read_i32(&p, 20),
            tlay: decode::read_i32(&p, 24),
        };
        domain.validate(idx)?;
        domains.push(domain);
    }
    if domains.is_empty() {
        return Err(PaError::HeaderCorrupt("domain list is empty".to_string()));
    }

    let mut processes = Vec::new();
    let mut nrxns = 0;
    match kind {
        FileKind::Ipr => {
            let nprc = count(rf, PROCESS_NAME_LEN, "process list")?;
            for _ in 0..nprc {
                let p = record(rf, PROCESS_NAME_LEN, "process name")?;
                processes.push(decode::read_text(&p, 0, PROCESS_NAME_LEN));
            }
            if processes.is_empty() {
                return Err(PaError::HeaderCorrupt("process list is empty".to_string()));
            }
        }
        FileKind::Irr => {
            // The reaction count stands alone; no name list follows it. Its
            // channels live inside each data record (4 bytes apiece), so the
            // plausibility bound is against one record, not a record list.
            let p = record(rf, 4, "reaction count")?;
            let n = decode::read_i32(&p, 0);
            let remaining = rf.file_size().saturating_sub(rf.record_start());
            if n <= 0 || n as u64 * 4 > remaining {
                return Err(PaError::HeaderCorrupt(format!(
                    "implausible reaction count {} with {} bytes remaining",
                    n, remaining
                )));
            }
            nrxns = n as usize;
        }
    }

    debug!(
        "Header parsed: {} grids, {} species, {} domains, {} processes, {} reactions",
        grids.len(),
        species.len(),
        domains.len(),
        processes.len(),
        nrxns
    );

    Ok(Header {
        kind,
        run_message,
        start_date,
        start_time,
        end_date,
        end_time,
        grids,
        species,
        domains,
        processes,
        nrxns,
    })
}

/// Reads one record and requires at least `min_len` payload bytes.
fn record(rf: &mut RecordFile, min_len: usize, what: &str) -> Result<Vec<u8>> {
    let payload = rf.read_record().map_err(|e| match e {
        PaError::Io(_) | PaError::BadFraming { .. } => {
            PaError::HeaderCorrupt(format!("truncated {} record: {}", what, e))
        }
        other => other,
    })?;
    if payload.len() < min_len {
        return Err(PaError::HeaderCorrupt(format!(
            "{} record is {} bytes, expected at least {}",
            what,
            payload.len(),
            min_len
        )));
    }
    Ok(payload)
}

/// Reads one count-prefixed list header: a single-int record holding N.
/// N is sanity-bounded against the bytes remaining in the file.
fn count(rf: &mut RecordFile, item_bytes: usize, what: &str) -> Result<usize> {
    let p = record(rf, 4, what)?;
    let n = decode::read_i32(&p, 0);
    if n < 0 {
        return Err(PaError::HeaderCorrupt(format!(
            "{} count is negative: {}",
            what, n
        )));
    }
    let remaining = rf.file_size().saturating_sub(rf.record_start());
    let needed = n as u64 * (item_bytes as u64 + PAD_OVERHEAD);
    if needed > remaining {
        return Err(PaError::HeaderCorrupt(format!(
            "{} count {} needs {} bytes but only {} remain",
            what, n, needed, remaining
        )));
    }
    Ok(n as usize)
}
