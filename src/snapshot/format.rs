//! On-disk layout of one snapshot pair.
//!
//! `vectors.bin`:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0 | 8 | magic `MNEMOVEC` |
//! | 8 | 4 | format version (LE u32) |
//! | 12 | 4 | dimension (LE u32, 0 for an empty store) |
//! | 16 | 8 | row count (LE u64) |
//! | 24 | 16 | generation UUID |
//! | 40 | .. | `count * dimension` LE f32 values, row-major |
//!
//! `memories.json` carries the same generation and one record per row.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::types::MemoryRecord;
use crate::memory::vectors::VectorStore;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "memories.json";
pub const FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 8] = b"MNEMOVEC";
const HEADER_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHeader {
    pub version: u32,
    pub dimension: u32,
    pub count: u64,
    pub generation: Uuid,
}

/// Contents of `memories.json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataFile {
    pub format_version: u32,
    pub generation: String,
    pub next_id: u64,
    pub dimension: Option<usize>,
    pub records: Vec<MemoryRecord>,
}

pub fn encode_vectors(vectors: &VectorStore, generation: Uuid) -> Vec<u8> {
    let dimension = vectors.dimension().unwrap_or(0);
    let mut out = Vec::with_capacity(HEADER_LEN + vectors.len() * dimension * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(dimension as u32).to_le_bytes());
    out.extend_from_slice(&(vectors.len() as u64).to_le_bytes());
    out.extend_from_slice(generation.as_bytes());
    for value in vectors.values() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_header(bytes: &[u8]) -> Result<VectorHeader, String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("file is {} bytes, shorter than the header", bytes.len()));
    }
    if &bytes[0..8] != MAGIC {
        return Err("bad magic".into());
    }
    let version = u32::from_le_bytes(read_array(&bytes[8..12]));
    let dimension = u32::from_le_bytes(read_array(&bytes[12..16]));
    let count = u64::from_le_bytes(read_array(&bytes[16..24]));
    let generation = Uuid::from_bytes(read_array(&bytes[24..40]));
    Ok(VectorHeader {
        version,
        dimension,
        count,
        generation,
    })
}

/// Decode a whole `vectors.bin`. An empty store decodes with no dimension.
pub fn decode_vectors(bytes: &[u8]) -> Result<(VectorHeader, VectorStore), String> {
    let header = decode_header(bytes)?;
    if header.version != FORMAT_VERSION {
        return Err(format!("unsupported format version {}", header.version));
    }

    let body = &bytes[HEADER_LEN..];
    let expected = (header.count as usize)
        .checked_mul(header.dimension as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| "header sizes overflow".to_string())?;
    if body.len() != expected {
        return Err(format!(
            "header promises {} rows of {} floats ({expected} bytes), body has {} bytes",
            header.count,
            header.dimension,
            body.len()
        ));
    }

    if header.dimension == 0 {
        if header.count != 0 {
            return Err("rows present with dimension 0".into());
        }
        return Ok((header, VectorStore::new()));
    }

    let values: Vec<f32> = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(read_array(chunk)))
        .collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err("non-finite vector component".into());
    }
    let store = VectorStore::from_flat(header.dimension as usize, values)?;
    Ok((header, store))
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// The `.tmp` sibling a file is staged in before being renamed over `path`.
pub fn staged_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

/// Write `bytes` to the staged sibling of `path` and fsync it. The target
/// itself is untouched until the caller renames the returned path over it.
pub(crate) fn stage(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let tmp_path = staged_path(path);
    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(tmp_path)
}
