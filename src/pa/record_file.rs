//! Fortran unformatted sequential-record file access.
//!
//! CAMx writes process-analysis files as legacy sequential records: each
//! logical record is preceded and followed by a 4-byte big-endian length
//! guard. This module hides the framing and exposes whole-record reads plus
//! absolute record-boundary seeks; field decoding on top of the returned
//! payload lives in [`decode`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::pa::error::{PaError, Result};

/// Framing overhead of one record: leading + trailing 4-byte guards.
pub const PAD_OVERHEAD: u64 = 8;

/// A byte source positioned on record boundaries.
#[derive(Debug)]
pub struct RecordFile {
    file: File,
    file_size: u64,
    /// Absolute byte offset of the current record boundary (the leading
    /// guard of the next record to be read).
    record_start: u64,
}

impl RecordFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            file_size,
            record_start: 0,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The underlying handle, for callers that map the file instead of
    /// reading through the record cursor.
    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Byte offset of the next record's leading guard.
    pub fn record_start(&self) -> u64 {
        self.record_start
    }

    /// Repositions the cursor at an absolute record boundary.
    pub fn seek_record(&mut self, byte: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(byte))?;
        self.record_start = byte;
        Ok(())
    }

    /// Reads the leading guard of the next record without consuming it.
    pub fn peek_record_size(&mut self) -> Result<u64> {
        let size = self.file.read_u32::<BigEndian>()?;
        self.file.seek(SeekFrom::Start(self.record_start))?;
        Ok(size as u64)
    }

    /// Reads one whole record payload, verifying both framing guards.
    pub fn read_record(&mut self) -> Result<Vec<u8>> {
        let start = self.record_start;
        let leading = self.file.read_u32::<BigEndian>()?;
        let len = leading as u64;
        if start + PAD_OVERHEAD + len > self.file_size {
            return Err(PaError::BadFraming {
                offset: start,
                leading,
                trailing: 0,
            });
        }
        let mut payload = vec![0u8; len as usize];
        self.file.read_exact(&mut payload)?;
        let trailing = self.file.read_u32::<BigEndian>()?;
        if trailing != leading {
            return Err(PaError::BadFraming {
                offset: start,
                leading,
                trailing,
            });
        }
        self.record_start = start + PAD_OVERHEAD + len;
        Ok(payload)
    }

    /// Skips one record, returning its payload size.
    pub fn skip_record(&mut self) -> Result<u64> {
        let start = self.record_start;
        let leading = self.file.read_u32::<BigEndian>()? as u64;
        if start + PAD_OVERHEAD + leading > self.file_size {
            return Err(PaError::BadFraming {
                offset: start,
                leading: leading as u32,
                trailing: 0,
            });
        }
        self.file.seek(SeekFrom::Start(start + PAD_OVERHEAD + leading))?;
        self.record_start = start + PAD_OVERHEAD + leading;
        Ok(leading)
    }
}

/// Field decoding over record payload slices.
///
/// All numeric fields are big-endian. Floats go through `f32::from_bits` so
/// any NaN payload present in the file (the historical uncomputed-cell
/// sentinel in particular) survives bit-exactly.
pub mod decode {
    use super::*;

    pub fn read_i32(payload: &[u8], offset: usize) -> i32 {
        BigEndian::read_i32(&payload[offset..offset + 4])
    }

    pub fn read_f32(payload: &[u8], offset: usize) -> f32 {
        f32::from_bits(BigEndian::read_u32(&payload[offset..offset + 4]))
    }

    /// Fixed-width ASCII text, trailing whitespace trimmed.
    pub fn read_text(payload: &[u8], offset: usize, width: usize) -> String {
        let raw = &payload[offset..offset + width];
        String::from_utf8_lossy(raw).trim_end().to_string()
    }
}
