//! Record schema derivation and stride arithmetic.
//!
//! Pure computation: given a parsed [`Header`], build the [`RecordSchema`]
//! describing one physical record and the nested strides used to address
//! records by `(species, timestep, i, j, k)`. Both decoders consume the same
//! schema, so their layout arithmetic cannot disagree.

use crate::pa::error::{PaError, Result};
use crate::pa::models::{
    FieldType, FileKind, Header, PaDomain, ProcessProfile, RecordField, RecordSchema,
};
use crate::pa::record_file::PAD_OVERHEAD;

/// Process channels common to both ipr profiles, in record order.
const COMMON_CHANNELS: [&str; 20] = [
    "INIT", "CHEM", "EMIS", "PTEMIS", "PIG", "WADV", "EADV", "SADV", "NADV", "BADV", "TADV",
    "DIL", "WDIF", "EDIF", "SDIF", "NDIF", "BDIF", "TDIF", "DDEP", "WDEP",
];

/// Channels closing out every ipr record after the chemistry terms.
const TAIL_CHANNELS: [&str; 3] = ["FCONC", "UCNV", "AVOL"];

/// Derives the physical record schema from a parsed header.
///
/// For ipr files the channel profile is selected by the process-name count:
/// 24 entries is the `AERCHEM`-merged layout, 26 the
/// `INORGACHEM`/`ORGACHEM`/`AQACHEM` split; any other count is rejected.
/// For irr files the channel count is the header's reaction count.
pub fn derive(header: &Header) -> Result<RecordSchema> {
    let mut fields = vec![
        RecordField { name: "SPAD".to_string(), ty: FieldType::Int },
        RecordField { name: "DATE".to_string(), ty: FieldType::Int },
        RecordField { name: "TIME".to_string(), ty: FieldType::Float },
    ];

    let profile = match header.kind {
        FileKind::Ipr => {
            let profile = match header.processes.len() {
                24 => ProcessProfile::AerchemMerged,
                26 => ProcessProfile::InorgOrgAqSplit,
                n => return Err(PaError::UnsupportedProcessChannelCount(n)),
            };
            fields.push(RecordField { name: "SPC".to_string(), ty: FieldType::Text(10) });
            Some(profile)
        }
        FileKind::Irr => None,
    };

    for name in ["PAGRID", "NEST", "I", "J", "K"] {
        fields.push(RecordField { name: name.to_string(), ty: FieldType::Int });
    }

    let data_start = fields.len();
    match profile {
        Some(tag) => {
            let chem: &[&str] = match tag {
                ProcessProfile::AerchemMerged => &["AERCHEM"],
                ProcessProfile::InorgOrgAqSplit => &["INORGACHEM", "ORGACHEM", "AQACHEM"],
            };
            for name in COMMON_CHANNELS.iter().chain(chem).chain(TAIL_CHANNELS.iter()) {
                fields.push(RecordField { name: name.to_string(), ty: FieldType::Float });
            }
        }
        None => {
            for rxn in 1..=header.nrxns {
                fields.push(RecordField { name: format!("IRR_{}", rxn), ty: FieldType::Float });
            }
        }
    }
    let data_fields = data_start..fields.len();

    fields.push(RecordField { name: "EPAD".to_string(), ty: FieldType::Int });

    let padded_size: u64 = fields.iter().map(|f| f.ty.size()).sum();
    let record_size = padded_size - PAD_OVERHEAD;
    let records_per_step =
        header.nvars_per_record() as u64 * header.active_domain().ncells() as u64;

    Ok(RecordSchema {
        kind: header.kind,
        profile,
        fields,
        data_fields,
        record_size,
        padded_size,
        records_per_step,
    })
}

/// Nested record strides over one domain: k varies fastest, then i, then j.
#[derive(Debug, Clone, Copy)]
pub struct DomainStrides {
    /// Records spanned by one column of layers.
    pub n_k: u64,
    /// Records spanned by one row of cells (all i, all k).
    pub n_i: u64,
    /// Records spanned by the whole domain for one variable and timestep.
    pub n_j: u64,
}

impl DomainStrides {
    pub fn new(domain: &PaDomain) -> Self {
        let n_k = domain.nlays() as u64;
        let n_i = domain.ncols() as u64 * n_k;
        let n_j = domain.nrows() as u64 * n_i;
        Self { n_k, n_i, n_j }
    }

    /// Records preceding cell `(i, j, k)` within one variable's block.
    /// Indices are the 1-based model cell indices from the domain bounds.
    pub fn cell_offset(&self, domain: &PaDomain, i: i32, j: i32, k: i32) -> u64 {
        debug_assert!(i >= domain.istart && i <= domain.iend);
        debug_assert!(j >= domain.jstart && j <= domain.jend);
        debug_assert!(k >= domain.blay && k <= domain.tlay);
        (j - domain.jstart) as u64 * self.n_i
            + (i - domain.istart) as u64 * self.n_k
            + (k - domain.blay) as u64
    }
}
