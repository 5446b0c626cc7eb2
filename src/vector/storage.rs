//! Binary on-disk format for the flat vector index.
//!
//! # Storage Format
//!
//! A single file with a fixed 16-byte header followed by the vector payload:
//! - Magic bytes `CQVI` (4 bytes)
//! - Format version (u32, little-endian)
//! - Vector dimension (u32, little-endian)
//! - Vector count (u32, little-endian)
//! - `count * dimension` f32 values, little-endian, in document order
//!
//! The layout is positional: vector i belongs to document i in the document
//! list persisted alongside it. The file round-trips exactly (same vectors,
//! same order). Reads go through a memory map so reload cost does not scale
//! with eager deserialization.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::MmapOptions;

use crate::vector::index::FlatVectorIndex;
use crate::vector::types::{VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes identifying a codequery vector index file.
const MAGIC_BYTES: &[u8; 4] = b"CQVI";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Writes the index to `path`, replacing any existing file.
pub fn write_index(path: &Path, index: &FlatVectorIndex) -> Result<(), VectorError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(MAGIC_BYTES)?;
    writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
    writer.write_all(&(index.dimension().get() as u32).to_le_bytes())?;
    writer.write_all(&(index.len() as u32).to_le_bytes())?;

    for value in index.as_raw() {
        writer.write_all(&value.to_le_bytes())?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

/// Reads an index back from `path`.
///
/// Any structural problem (bad magic, unsupported version, truncated or
/// oversized payload) is reported as a format error so callers can treat the
/// file as corrupt and rebuild.
pub fn read_index(path: &Path) -> Result<FlatVectorIndex, VectorError> {
    let file = File::open(path)?;
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    if mmap.len() < HEADER_SIZE {
        return Err(VectorError::InvalidFormat(
            "file too small to contain header".to_string(),
        ));
    }
    if &mmap[0..4] != MAGIC_BYTES {
        return Err(VectorError::InvalidFormat("invalid magic bytes".to_string()));
    }

    let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
    if version != STORAGE_VERSION {
        return Err(VectorError::VersionMismatch {
            expected: STORAGE_VERSION,
            actual: version,
        });
    }

    let dim_value = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]) as usize;
    let dimension = VectorDimension::new(dim_value)?;
    let count = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

    // Header fields come from disk; checked arithmetic keeps a corrupt
    // header an InvalidFormat instead of an overflow panic.
    let expected_len = count
        .checked_mul(dim_value)
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or_else(|| {
            VectorError::InvalidFormat(format!(
                "header claims {count} vectors of dimension {dim_value}, which cannot fit in a file"
            ))
        })?;
    if mmap.len() != expected_len {
        return Err(VectorError::InvalidFormat(format!(
            "expected {expected_len} bytes for {count} vectors of dimension {dim_value}, found {}",
            mmap.len()
        )));
    }

    // Bounded by the length check above: count * dim_value <= mmap.len() / 4.
    let mut data = Vec::with_capacity(count * dim_value);
    for chunk in mmap[HEADER_SIZE..].chunks_exact(BYTES_PER_F32) {
        data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    FlatVectorIndex::from_raw(dimension, data)
}
