//! Logical variables: named 4-D views over the record stream, plus the
//! precomputed name-resolution map shared by both decoders.

use std::collections::HashMap;

use crate::pa::models::{FileKind, Header, RecordSchema};

pub const DIM_TSTEP: &str = "TSTEP";
pub const DIM_LAY: &str = "LAY";
pub const DIM_ROW: &str = "ROW";
pub const DIM_COL: &str = "COL";
pub const DIM_VAR: &str = "VAR";
pub const DIM_DATETIME: &str = "DATE-TIME";

/// Big-endian f32 bit pattern historically written by the model to flag an
/// unfilled cell. Decoders must hand this through bit-exactly; consumers
/// test for the exact pattern, not for NaN-ness.
pub const UNCOMPUTED_SENTINEL: u32 = 0xFFC0_0000;

/// True if a decoded value is the uncomputed-cell sentinel, bit-exact.
pub fn is_uncomputed(value: f32) -> bool {
    value.to_bits() == UNCOMPUTED_SENTINEL
}

/// Decoded variable values. Data channels and the `TIME` field are floats,
/// identification fields and `TFLAG` are ints, and `SPC` is fixed-width text.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValues {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Text(Vec<String>),
}

impl VarValues {
    pub fn len(&self) -> usize {
        match self {
            VarValues::Float(v) => v.len(),
            VarValues::Int(v) => v.len(),
            VarValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            VarValues::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            VarValues::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            VarValues::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// A named variable extracted from the file: metadata plus row-major values
/// over the named dimensions.
#[derive(Debug, Clone)]
pub struct LogicalVariable {
    pub name: String,
    pub units: String,
    pub long_name: String,
    pub dims: Vec<&'static str>,
    pub shape: Vec<usize>,
    pub values: VarValues,
}

impl LogicalVariable {
    /// Row-major linear index for a multi-dimensional position.
    pub fn offset(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.shape.len());
        index
            .iter()
            .zip(&self.shape)
            .fold(0, |acc, (&i, &extent)| acc * extent + i)
    }

    pub fn get_f32(&self, index: &[usize]) -> Option<f32> {
        self.values.as_f32().map(|v| v[self.offset(index)])
    }

    pub fn get_i32(&self, index: &[usize]) -> Option<i32> {
        self.values.as_i32().map(|v| v[self.offset(index)])
    }

    pub fn get_text(&self, index: &[usize]) -> Option<&str> {
        self.values.as_text().map(|v| v[self.offset(index)].as_str())
    }
}

/// Decode descriptor a variable name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarSlot {
    /// A schema field at a variable index (species index for ipr; always 0
    /// for irr, whose channels are distinct fields).
    Field { field: usize, var: usize },
    /// The synthesized timestamp variable.
    Tflag,
}

/// Builds the variable-name resolution map once from the schema and name
/// lists, so lookup is an ordinary key probe rather than repeated string
/// splitting. Returns `(declared variable keys, resolution map)`; the
/// declared keys define the `VAR` dimension extent.
pub(crate) fn build_varmap(
    header: &Header,
    schema: &RecordSchema,
) -> (Vec<String>, HashMap<String, VarSlot>) {
    let mut varkeys = Vec::new();
    let mut map = HashMap::new();

    // Every physical field resolves, framing guards included (a guard's
    // value is the record payload length).
    match header.kind {
        FileKind::Ipr => {
            // Every field crossed with every species.
            for (fi, field) in schema.fields.iter().enumerate() {
                for (si, spc) in header.species.iter().enumerate() {
                    let key = format!("{}_{}", field.name, spc);
                    map.insert(key.clone(), VarSlot::Field { field: fi, var: si });
                    varkeys.push(key);
                }
            }
        }
        FileKind::Irr => {
            for fi in schema.data_fields.clone() {
                let key = schema.fields[fi].name.clone();
                map.insert(key.clone(), VarSlot::Field { field: fi, var: 0 });
                varkeys.push(key);
            }
        }
    }

    // Bare field names resolve broadcast at variable index 0.
    for (fi, field) in schema.fields.iter().enumerate() {
        map.entry(field.name.clone())
            .or_insert(VarSlot::Field { field: fi, var: 0 });
    }
    map.insert("TFLAG".to_string(), VarSlot::Tflag);

    (varkeys, map)
}

/// Units string for data-channel variables of a file kind.
pub(crate) fn channel_units(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Ipr => "umol/m**3",
        FileKind::Irr => "umol/hr",
    }
}

/// Left-justified 16-character long name, IOAPI style.
pub(crate) fn long_name(name: &str) -> String {
    format!("{:<16}", name)
}
