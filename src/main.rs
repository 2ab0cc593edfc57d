use std::env;

use camx_pa_reader::{AccessMode, Dataset, FileKind};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <path-to-pa-file> <ipr|irr> [--seek] [--var NAME]", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    let kind = match args[2].as_str() {
        "ipr" => FileKind::Ipr,
        "irr" => FileKind::Irr,
        other => {
            eprintln!("ERROR: Unknown file kind '{}'. Expected 'ipr' or 'irr'.", other);
            std::process::exit(1);
        }
    };
    let mode = if args.iter().any(|a| a == "--seek") {
        AccessMode::Seeking
    } else {
        AccessMode::Mapped
    };
    let var_name = args
        .iter()
        .position(|a| a == "--var")
        .and_then(|idx| args.get(idx + 1))
        .cloned();

    println!("Reading CAMx {} file: {}", kind, path);
    println!("{}", "=".repeat(60));

    let mut dataset = match Dataset::open(path, kind, mode) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("\nERROR: Failed to open {} file", kind);
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let header = dataset.header();
    println!("\nRun message: {}", header.run_message);
    println!(
        "Period: ({}, {}) -> ({}, {})",
        header.start_date, header.start_time, header.end_date, header.end_time
    );
    println!(
        "Timesteps: {} of {} (HHMM)",
        dataset.time_step_count(),
        dataset.step_hhmm()
    );
    println!("Grids: {}  Domains: {}", header.grids.len(), header.domains.len());
    if !header.species.is_empty() {
        println!("Species ({}): {}", header.species.len(), header.species.join(", "));
    }
    if header.nrxns > 0 {
        println!("Reactions: {}", header.nrxns);
    }

    println!("\nDimensions:");
    for (name, extent) in dataset.dimensions() {
        println!("  {} = {}", name, extent);
    }

    let nkeys = dataset.variables().len();
    println!("\nVariable keys ({} total, first 10):", nkeys);
    for key in dataset.variables().iter().take(10) {
        println!("  {}", key);
    }
    if nkeys > 10 {
        println!("  ... and {} more", nkeys - 10);
    }

    if let Some(name) = var_name {
        match dataset.variable(&name) {
            Ok(v) => {
                println!("\n{}:", v.name);
                println!("  units: {}", v.units);
                println!("  dims: {:?}  shape: {:?}", v.dims, v.shape);
                if let Some(vals) = v.values.as_f32() {
                    let finite: Vec<f32> = vals.iter().copied().filter(|x| x.is_finite()).collect();
                    let uncomputed = vals
                        .iter()
                        .filter(|x| camx_pa_reader::pa::var::is_uncomputed(**x))
                        .count();
                    let (min, max) = finite.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &x| {
                        (lo.min(x), hi.max(x))
                    });
                    println!("  min: {}  max: {}  uncomputed cells: {}", min, max, uncomputed);
                }
            }
            Err(e) => {
                eprintln!("\nERROR: {}", e);
                std::process::exit(1);
            }
        }
    }

    dataset.close();
}
