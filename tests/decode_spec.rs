//! End-to-end tests over synthetic ipr/irr fixtures.
//!
//! Fixtures are generated in-memory with deterministic cell values so every
//! decoded array can be checked against the generator, then written to a
//! temp directory for the readers to open.

use std::path::PathBuf;

use tempfile::TempDir;

use camx_pa_reader::pa::timetuple::TimeLine;
use camx_pa_reader::{
    AccessMode, Dataset, FileKind, MappedDataset, PaError, ProcessProfile, SeekingDataset,
    UNCOMPUTED_SENTINEL,
};

// Fixture geometry: 1 grid, 1 domain, i 1..=2, j 1..=3, k 1..=2.
const ISTART: i32 = 1;
const IEND: i32 = 2;
const JSTART: i32 = 1;
const JEND: i32 = 3;
const BLAY: i32 = 1;
const TLAY: i32 = 2;
const NCOL: usize = 2;
const NROW: usize = 3;
const NLAY: usize = 2;
const START_DATE: i32 = 5185;
const SPECIES: [&str; 2] = ["O3", "NO2"];
const NRXNS: usize = 3;

fn push_rec(file: &mut Vec<u8>, payload: &[u8]) {
    let guard = (payload.len() as u32).to_be_bytes();
    file.extend_from_slice(&guard);
    file.extend_from_slice(payload);
    file.extend_from_slice(&guard);
}

fn push_i32(p: &mut Vec<u8>, v: i32) {
    p.extend_from_slice(&v.to_be_bytes());
}

fn push_f32(p: &mut Vec<u8>, v: f32) {
    p.extend_from_slice(&v.to_bits().to_be_bytes());
}

fn push_text(p: &mut Vec<u8>, s: &str, width: usize) {
    let mut bytes = s.as_bytes().to_vec();
    bytes.resize(width, b' ');
    p.extend_from_slice(&bytes);
}

/// Deterministic ipr channel value for a cell.
fn ipr_val(t: usize, s: usize, j: i32, i: i32, k: i32, c: usize) -> f32 {
    let key = (((t as i32 * 10 + s as i32) * 10 + j) * 10 + i) * 10 + k;
    (key * 100 + c as i32) as f32
}

/// Deterministic irr channel value for a cell.
fn irr_val(t: usize, j: i32, i: i32, k: i32, r: usize) -> f32 {
    ((((t as i32 * 10 + j) * 10 + i) * 10 + k) * 10 + r as i32) as f32
}

struct Fixture {
    bytes: Vec<u8>,
    data_start: usize,
}

/// Builds an ipr file: 80-char run message, time bounds, 1 grid (6 ints),
/// species list, 1 domain, `nproc` process names, then
/// `nsteps × nspec × cells` records of `nproc` channels each.
fn build_ipr(nsteps: usize, nproc: usize, with_sentinel: bool) -> Fixture {
    let mut file = Vec::new();

    let mut p = Vec::new();
    push_text(&mut p, "CAMx ipr test run", 80);
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, START_DATE);
    push_f32(&mut p, 0.0);
    push_i32(&mut p, START_DATE);
    push_f32(&mut p, nsteps as f32 * 100.0);
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, 1);
    push_rec(&mut file, &p);
    let mut p = Vec::new();
    for v in [0, 0, 10, 12, 4000, 4000] {
        push_i32(&mut p, v);
    }
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, SPECIES.len() as i32);
    push_rec(&mut file, &p);
    for spc in SPECIES {
        let mut p = Vec::new();
        push_text(&mut p, spc, 10);
        push_rec(&mut file, &p);
    }

    let mut p = Vec::new();
    push_i32(&mut p, 1);
    push_rec(&mut file, &p);
    let mut p = Vec::new();
    for v in [1, ISTART, IEND, JSTART, JEND, BLAY, TLAY] {
        push_i32(&mut p, v);
    }
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, nproc as i32);
    push_rec(&mut file, &p);
    for n in 0..nproc {
        let mut p = Vec::new();
        push_text(&mut p, &format!("Process {:02}", n + 1), 25);
        push_rec(&mut file, &p);
    }

    let data_start = file.len();
    for t in 0..nsteps {
        let time = (t + 1) as f32 * 100.0;
        for (s, spc) in SPECIES.iter().enumerate() {
            for j in JSTART..=JEND {
                for i in ISTART..=IEND {
                    for k in BLAY..=TLAY {
                        let mut p = Vec::new();
                        push_i32(&mut p, START_DATE);
                        push_f32(&mut p, time);
                        push_text(&mut p, spc, 10);
                        push_i32(&mut p, 1); // pagrid
                        push_i32(&mut p, 1); // nest
                        push_i32(&mut p, i);
                        push_i32(&mut p, j);
                        push_i32(&mut p, k);
                        for c in 0..nproc {
                            let sentinel_cell = with_sentinel
                                && t == 0
                                && s == 0
                                && j == JSTART
                                && i == ISTART
                                && k == BLAY
                                && c == 1;
                            if sentinel_cell {
                                p.extend_from_slice(&UNCOMPUTED_SENTINEL.to_be_bytes());
                            } else {
                                push_f32(&mut p, ipr_val(t, s, j, i, k, c));
                            }
                        }
                        push_rec(&mut file, &p);
                    }
                }
            }
        }
    }

    Fixture {
        bytes: file,
        data_start,
    }
}

/// Builds an irr file: run message, time bounds, 1 grid (7 ints), 1 domain,
/// reaction count, then `nsteps × cells` records of `NRXNS` channels each.
fn build_irr(nsteps: usize, end_time: Option<f32>) -> Fixture {
    let mut file = Vec::new();

    let mut p = Vec::new();
    push_text(&mut p, "CAMx irr test run", 80);
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, START_DATE);
    push_f32(&mut p, 0.0);
    push_i32(&mut p, START_DATE);
    push_f32(&mut p, end_time.unwrap_or(nsteps as f32 * 100.0));
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, 1);
    push_rec(&mut file, &p);
    let mut p = Vec::new();
    for v in [0, 0, 10, 12, 4000, 4000, 14] {
        push_i32(&mut p, v);
    }
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, 1);
    push_rec(&mut file, &p);
    let mut p = Vec::new();
    for v in [1, ISTART, IEND, JSTART, JEND, BLAY, TLAY] {
        push_i32(&mut p, v);
    }
    push_rec(&mut file, &p);

    let mut p = Vec::new();
    push_i32(&mut p, NRXNS as i32);
    push_rec(&mut file, &p);

    let data_start = file.len();
    for t in 0..nsteps {
        let time = (t + 1) as f32 * 100.0;
        for j in JSTART..=JEND {
            for i in ISTART..=IEND {
                for k in BLAY..=TLAY {
                    let mut p = Vec::new();
                    push_i32(&mut p, START_DATE);
                    push_f32(&mut p, time);
                    push_i32(&mut p, 1);
                    push_i32(&mut p, 1);
                    push_i32(&mut p, i);
                    push_i32(&mut p, j);
                    push_i32(&mut p, k);
                    for r in 0..NRXNS {
                        push_f32(&mut p, irr_val(t, j, i, k, r));
                    }
                    push_rec(&mut file, &p);
                }
            }
        }
    }

    Fixture {
        bytes: file,
        data_start,
    }
}

fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

#[test]
fn ipr_header_species_and_dimensions() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(4, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).expect("open ipr");

    let header = ds.header();
    assert_eq!(header.run_message, "CAMx ipr test run");
    // 10-byte fixed-width names come back with trailing whitespace stripped.
    assert_eq!(header.species, vec!["O3".to_string(), "NO2".to_string()]);
    assert_eq!(header.domains.len(), 1);
    assert_eq!(header.active_domain().ncells(), NCOL * NROW * NLAY);
    assert_eq!(ds.schema().profile, Some(ProcessProfile::AerchemMerged));
    assert_eq!(ds.schema().record_size, 134);
    assert_eq!(ds.schema().padded_size, 142);

    assert_eq!(ds.time_step_count(), 4);
    assert_eq!(ds.step_hhmm(), 100.0);

    let dims: std::collections::HashMap<_, _> = ds.dimensions().iter().copied().collect();
    assert_eq!(dims["TSTEP"], 4);
    assert_eq!(dims["COL"], NCOL);
    assert_eq!(dims["ROW"], NROW);
    assert_eq!(dims["LAY"], NLAY);
    // 10 physical fields (guards included) + 24 channels, crossed with 2
    // species.
    assert_eq!(dims["VAR"], 34 * 2);
    assert_eq!(dims["DATE-TIME"], 2);
}

#[test]
fn size_law_accounts_for_every_byte() {
    let dir = TempDir::new().unwrap();
    for (name, kind, fx) in [
        ("a.ipr", FileKind::Ipr, build_ipr(4, 24, false)),
        ("a.irr", FileKind::Irr, build_irr(3, None)),
    ] {
        let path = write_fixture(&dir, name, &fx.bytes);
        let ds = MappedDataset::open(&path, kind).expect("open");
        let schema = ds.schema();
        let expected = fx.data_start as u64
            + ds.time_step_count() as u64 * schema.records_per_step * schema.padded_size;
        assert_eq!(expected, fx.bytes.len() as u64, "{}", name);
    }
}

#[test]
fn mapped_channel_extraction_matches_generator() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(4, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();

    // CHEM is the second channel; NO2 the second species.
    let v = ds.variable("CHEM_NO2").unwrap();
    assert_eq!(v.dims, vec!["TSTEP", "LAY", "ROW", "COL"]);
    assert_eq!(v.shape, vec![4, NLAY, NROW, NCOL]);
    assert_eq!(v.units, "umol/m**3");
    assert_eq!(v.long_name, "CHEM_NO2        ");
    for t in 0..4 {
        for l in 0..NLAY {
            for r in 0..NROW {
                for c in 0..NCOL {
                    let want = ipr_val(t, 1, JSTART + r as i32, ISTART + c as i32, BLAY + l as i32, 1);
                    assert_eq!(v.get_f32(&[t, l, r, c]), Some(want));
                }
            }
        }
    }
}

#[test]
fn mapped_bare_field_broadcasts_first_variable() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();

    let v = ds.variable("K").unwrap();
    let vals = v.values.as_i32().expect("K is an int field");
    assert_eq!(vals.len(), 2 * NLAY * NROW * NCOL);
    for t in 0..2 {
        for l in 0..NLAY {
            for r in 0..NROW {
                for c in 0..NCOL {
                    assert_eq!(v.get_i32(&[t, l, r, c]), Some(BLAY + l as i32));
                }
            }
        }
    }
}

#[test]
fn tflag_spans_start_to_end_inclusive() {
    let dir = TempDir::new().unwrap();
    // A full simulated day: start 0000, end 2400, hourly records.
    let fx = build_ipr(24, 24, false);
    let path = write_fixture(&dir, "day.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();

    assert_eq!(ds.time_step_count(), 24);
    let tflag = ds.variable("TFLAG").unwrap();
    assert_eq!(tflag.dims, vec!["TSTEP", "VAR", "DATE-TIME"]);
    assert_eq!(tflag.shape[0], 25);
    assert_eq!(tflag.get_i32(&[0, 0, 0]), Some(2005185));
    assert_eq!(tflag.get_i32(&[0, 0, 1]), Some(0));
    assert_eq!(tflag.get_i32(&[24, 0, 0]), Some(2005185));
    assert_eq!(tflag.get_i32(&[24, 0, 1]), Some(240000));
}

#[test]
fn sentinel_bits_survive_decode_exactly() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, true);
    let path = write_fixture(&dir, "nan.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();

    let v = ds.variable("CHEM_O3").unwrap();
    let got = v.get_f32(&[0, 0, 0, 0]).unwrap();
    assert!(got.is_nan());
    assert_eq!(got.to_bits(), UNCOMPUTED_SENTINEL);
    // Every other cell is untouched.
    assert_eq!(v.get_f32(&[1, 0, 0, 0]), Some(ipr_val(1, 0, JSTART, ISTART, BLAY, 1)));
}

#[test]
fn unknown_variable_is_rejected() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();

    assert!(matches!(
        ds.variable("CHEM_SO2"),
        Err(PaError::UnknownVariable(_))
    ));
    assert!(matches!(
        ds.variable("NOSUCH"),
        Err(PaError::UnknownVariable(_))
    ));
}

#[test]
fn guards_and_species_field_resolve_as_variables() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let mapped = MappedDataset::open(&path, FileKind::Ipr).unwrap();
    let mut seeking = SeekingDataset::open(&path, FileKind::Ipr).unwrap();

    // Guard fields decode to the record payload length, bare and qualified.
    for name in ["SPAD", "EPAD_NO2"] {
        let v = mapped.variable(name).unwrap();
        let ints = v.values.as_i32().unwrap();
        assert_eq!(ints.len(), 2 * NLAY * NROW * NCOL);
        assert!(ints.iter().all(|&g| g == 134), "{}", name);
    }

    // The species text field resolves per species index.
    let spc = mapped.variable("SPC_NO2").unwrap();
    assert!(spc.values.as_text().unwrap().iter().all(|s| s == "NO2"));
    assert_eq!(spc.get_text(&[0, 0, 0, 0]), Some("NO2"));
    let bare = mapped.variable("SPC").unwrap();
    assert!(bare.values.as_text().unwrap().iter().all(|s| s == "O3"));

    // Both decoders agree on the non-channel fields too.
    for name in ["SPAD", "EPAD_NO2", "SPC_NO2", "SPC"] {
        let m = mapped.variable(name).unwrap();
        let s = seeking.variable(name).unwrap();
        assert_eq!(m.values, s.values, "{}", name);
    }
}

#[test]
fn close_is_idempotent_and_invalidates_lookups() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let mut ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();

    assert!(ds.variable("CHEM_O3").is_ok());
    ds.close();
    ds.close(); // second close is a no-op
    assert!(ds.is_closed());
    assert!(matches!(ds.variable("CHEM_O3"), Err(PaError::ClosedDataset)));

    // Same contract through the facade, seeking mode.
    let mut ds = Dataset::open(&path, FileKind::Ipr, AccessMode::Seeking).unwrap();
    assert!(ds.variable("CHEM_O3").is_ok());
    ds.close();
    ds.close();
    assert!(matches!(ds.variable("CHEM_O3"), Err(PaError::ClosedDataset)));
}

#[test]
fn seek_then_read_one_matches_every_key() {
    let dir = TempDir::new().unwrap();
    let fx = build_irr(3, None);
    let path = write_fixture(&dir, "test.irr", &fx.bytes);
    let mut ds = SeekingDataset::open(&path, FileKind::Irr).unwrap();

    let keys: Vec<_> = ds.iterate_keys(0).unwrap().collect();
    assert_eq!(keys.len(), 3 * NCOL * NROW * NLAY);
    for key in keys {
        ds.seek(key.domain, key.date, key.time, key.i, key.j, key.k)
            .unwrap();
        let rec = ds.read_one().unwrap();
        assert_eq!(rec.date, key.date);
        assert_eq!(rec.time, key.time);
        assert_eq!((rec.i, rec.j, rec.k), (key.i, key.j, key.k));
        let t = (key.time / 100.0) as usize - 1;
        for (r, &got) in rec.values.iter().enumerate() {
            assert_eq!(got, irr_val(t, key.j, key.i, key.k, r));
        }
    }
}

#[test]
fn iterate_keys_is_ordered_and_restartable() {
    let dir = TempDir::new().unwrap();
    let fx = build_irr(2, None);
    let path = write_fixture(&dir, "test.irr", &fx.bytes);
    let ds = SeekingDataset::open(&path, FileKind::Irr).unwrap();

    let first: Vec<_> = ds.iterate_keys(0).unwrap().collect();
    let second: Vec<_> = ds.iterate_keys(0).unwrap().collect();
    assert_eq!(first, second);

    // Write order: time outer, then j, then i, then k innermost.
    assert_eq!((first[0].date, first[0].time), (START_DATE, 100.0));
    assert_eq!((first[0].i, first[0].j, first[0].k), (ISTART, JSTART, BLAY));
    assert_eq!((first[1].i, first[1].j, first[1].k), (ISTART, JSTART, BLAY + 1));
    assert_eq!((first[2].i, first[2].j, first[2].k), (ISTART + 1, JSTART, BLAY));
    let per_step = NCOL * NROW * NLAY;
    assert_eq!(first[per_step].time, 200.0);
}

#[test]
fn read_batch_clamps_window_and_matches_mapped() {
    let dir = TempDir::new().unwrap();
    let fx = build_irr(3, None);
    let path = write_fixture(&dir, "test.irr", &fx.bytes);
    let mapped = MappedDataset::open(&path, FileKind::Irr).unwrap();
    let mut seeking = SeekingDataset::open(&path, FileKind::Irr).unwrap();

    // Ask for far more channels than exist; the window clamps to 3.
    let batch = seeking.read_batch(0, 99).unwrap();
    assert_eq!(batch.len(), NRXNS);
    for v in &batch {
        let m = mapped.variable(&v.name).unwrap();
        assert_eq!(v.shape, m.shape);
        assert_eq!(v.values, m.values);
    }
    assert!(matches!(
        seeking.read_batch(NRXNS, 1),
        Err(PaError::UnknownVariable(_))
    ));
}

#[test]
fn out_of_range_species_and_domain_indices_are_errors() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let mapped = MappedDataset::open(&path, FileKind::Ipr).unwrap();
    let mut ds = SeekingDataset::open(&path, FileKind::Ipr).unwrap();

    assert!(matches!(
        ds.read_batch_species(5, 0, 1),
        Err(PaError::IndexOutOfRange {
            what: "species",
            index: 5,
            count: 2
        })
    ));
    assert!(matches!(
        ds.seek_species(0, 9, START_DATE, 100.0, ISTART, JSTART, BLAY),
        Err(PaError::IndexOutOfRange { what: "species", .. })
    ));
    assert!(matches!(
        ds.seek(3, START_DATE, 100.0, ISTART, JSTART, BLAY),
        Err(PaError::IndexOutOfRange { what: "domain", .. })
    ));
    assert!(matches!(
        ds.iterate_keys(1),
        Err(PaError::IndexOutOfRange { what: "domain", .. })
    ));

    // In-range species windows still decode, matching the mapped view.
    let batch = ds.read_batch_species(1, 1, 1).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].name, "CHEM_NO2");
    let m = mapped.variable("CHEM_NO2").unwrap();
    assert_eq!(batch[0].values, m.values);
}

#[test]
fn seeking_variable_matches_mapped_for_ipr() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(3, 24, false);
    let path = write_fixture(&dir, "test.ipr", &fx.bytes);
    let mapped = MappedDataset::open(&path, FileKind::Ipr).unwrap();
    let mut seeking = SeekingDataset::open(&path, FileKind::Ipr).unwrap();

    for name in ["CHEM_NO2", "WDEP_O3", "AVOL_NO2", "TFLAG", "I"] {
        let m = mapped.variable(name).unwrap();
        let s = seeking.variable(name).unwrap();
        assert_eq!(m.shape, s.shape, "{}", name);
        assert_eq!(m.values, s.values, "{}", name);
    }
    // Second lookup is served from cache and stays identical.
    let again = seeking.variable("CHEM_NO2").unwrap();
    assert_eq!(again.values, mapped.variable("CHEM_NO2").unwrap().values);
}

#[test]
fn irr_variable_lookup_batches_channels() {
    let dir = TempDir::new().unwrap();
    let fx = build_irr(2, None);
    let path = write_fixture(&dir, "test.irr", &fx.bytes);
    let mut ds = SeekingDataset::open(&path, FileKind::Irr).unwrap();

    let v = ds.variable("IRR_2").unwrap();
    assert_eq!(v.units, "umol/hr");
    for t in 0..2 {
        for l in 0..NLAY {
            for r in 0..NROW {
                for c in 0..NCOL {
                    let want = irr_val(t, JSTART + r as i32, ISTART + c as i32, BLAY + l as i32, 1);
                    assert_eq!(v.get_f32(&[t, l, r, c]), Some(want));
                }
            }
        }
    }
}

#[test]
fn corrupted_identity_field_desyncs_the_batch() {
    let dir = TempDir::new().unwrap();
    let mut fx = build_irr(2, None);
    // Flip the I field of the third data record.
    let schema_padded = 8 + 28 + 4 * NRXNS; // guards + ids + channels
    let at = fx.data_start + 2 * schema_padded + 4 + 16;
    fx.bytes[at..at + 4].copy_from_slice(&99i32.to_be_bytes());
    let path = write_fixture(&dir, "bad.irr", &fx.bytes);

    let mut ds = SeekingDataset::open(&path, FileKind::Irr).unwrap();
    assert!(matches!(
        ds.read_batch(0, NRXNS),
        Err(PaError::LayoutDesync { record: 2, .. })
    ));
}

#[test]
fn seek_rejects_times_outside_the_range() {
    let dir = TempDir::new().unwrap();
    let fx = build_irr(2, None);
    let path = write_fixture(&dir, "test.irr", &fx.bytes);
    let mut ds = SeekingDataset::open(&path, FileKind::Irr).unwrap();

    assert!(matches!(
        ds.seek(0, START_DATE, 123.0, ISTART, JSTART, BLAY),
        Err(PaError::TimeNotFound { .. })
    ));
    // The start bound itself carries no data record.
    assert!(matches!(
        ds.seek(0, START_DATE, 0.0, ISTART, JSTART, BLAY),
        Err(PaError::TimeNotFound { .. })
    ));
    // The dataset stays usable after a failed lookup.
    assert!(ds.variable("IRR_1").is_ok());
}

#[test]
fn process_profile_selection() {
    let dir = TempDir::new().unwrap();

    let fx = build_ipr(2, 26, false);
    let path = write_fixture(&dir, "split.ipr", &fx.bytes);
    let ds = MappedDataset::open(&path, FileKind::Ipr).unwrap();
    assert_eq!(ds.schema().profile, Some(ProcessProfile::InorgOrgAqSplit));
    assert!(ds.variable("INORGACHEM_O3").is_ok());
    assert!(matches!(
        ds.variable("AERCHEM_O3"),
        Err(PaError::UnknownVariable(_))
    ));

    let fx = build_ipr(2, 25, false);
    let path = write_fixture(&dir, "odd.ipr", &fx.bytes);
    assert!(matches!(
        MappedDataset::open(&path, FileKind::Ipr),
        Err(PaError::UnsupportedProcessChannelCount(25))
    ));
}

#[test]
fn corrupt_headers_fail_fast() {
    let dir = TempDir::new().unwrap();
    let fx = build_ipr(2, 24, false);

    // Truncated mid-header.
    let path = write_fixture(&dir, "short.ipr", &fx.bytes[..60]);
    assert!(matches!(
        MappedDataset::open(&path, FileKind::Ipr),
        Err(PaError::HeaderCorrupt(_))
    ));

    // Negative species count.
    let mut bad = Vec::new();
    let mut p = Vec::new();
    push_text(&mut p, "bad run", 80);
    push_rec(&mut bad, &p);
    let mut p = Vec::new();
    push_i32(&mut p, START_DATE);
    push_f32(&mut p, 0.0);
    push_i32(&mut p, START_DATE);
    push_f32(&mut p, 200.0);
    push_rec(&mut bad, &p);
    let mut p = Vec::new();
    push_i32(&mut p, 0);
    push_rec(&mut bad, &p); // zero grids
    let mut p = Vec::new();
    push_i32(&mut p, -1);
    push_rec(&mut bad, &p); // negative species count
    let path = write_fixture(&dir, "neg.ipr", &bad);
    assert!(matches!(
        MappedDataset::open(&path, FileKind::Ipr),
        Err(PaError::HeaderCorrupt(_))
    ));

    // A period that is not a whole multiple of the inferred step.
    let fx = build_irr(2, Some(130.0));
    let path = write_fixture(&dir, "frac.irr", &fx.bytes);
    assert!(matches!(
        MappedDataset::open(&path, FileKind::Irr),
        Err(PaError::HeaderCorrupt(_))
    ));
}

#[test]
fn timeline_handles_day_boundaries() {
    // 23:00 start, hourly step: the first stamp lands on midnight and is
    // written as (same date, 2400); the next one rolls the julian date.
    let tl = TimeLine::infer((5185, 2300.0), (5186, 100.0), (5185, 2400.0)).unwrap();
    assert_eq!(tl.nsteps, 2);
    assert_eq!(tl.stamp(0), (5185, 2400.0));
    assert_eq!(tl.stamp(1), (5186, 100.0));
    assert_eq!(tl.index_of(5185, 2400.0).unwrap(), 0);
    // 2400 and next-day 0000 are the same instant.
    assert_eq!(tl.index_of(5186, 0.0).unwrap(), 0);

    // Year-end rollover (2005 is not a leap year, so day 365 is Dec 31).
    let tl = TimeLine::infer((5365, 2300.0), (6001, 100.0), (5365, 2400.0)).unwrap();
    assert_eq!(tl.stamp(0), (5365, 2400.0));
    assert_eq!(tl.stamp(1), (6001, 100.0));
}
