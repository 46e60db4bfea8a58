//! Snapshot persistence: a flat vector file plus a parallel JSON ledger.
//!
//! [`SnapshotDir`] owns one data directory. Writes archive the previous pair,
//! stage both new files as fsynced `*.tmp` siblings, and only then rename them
//! into place, vectors first. A write that fails while staging leaves the
//! previous pair untouched. One interrupted between the two renames leaves new
//! vectors, the old ledger and the staged new ledger; the generation UUID
//! stamped into both files identifies the staged ledger as the match, and
//! [`SnapshotDir::load`] completes the rename. Any other mismatched pair is
//! reported as corruption, never half-loaded.

pub mod backup;
pub mod format;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::memory::index::MemoryIndex;
use backup::BackupInfo;
use format::{MetadataFile, FORMAT_VERSION, METADATA_FILE, VECTORS_FILE};

#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
    max_backups: usize,
}

impl SnapshotDir {
    pub fn new(root: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            root: root.into(),
            max_backups,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.root.join(VECTORS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Load the live snapshot. `Ok(None)` when neither file exists yet.
    pub fn load(&self) -> Result<Option<MemoryIndex>> {
        let vectors_path = self.vectors_path();
        let metadata_path = self.metadata_path();
        match load_pair(&vectors_path, &metadata_path) {
            Err(MemoryError::Corruption { path, reason }) => {
                if self.roll_forward()? {
                    load_pair(&vectors_path, &metadata_path)
                } else {
                    Err(MemoryError::Corruption { path, reason })
                }
            }
            other => other,
        }
    }

    /// Finish a write that stopped between its two renames. The staged ledger
    /// is promoted only if it carries the generation of the live vectors.
    fn roll_forward(&self) -> Result<bool> {
        let staged = format::staged_path(&self.metadata_path());
        let Ok(bytes) = fs::read(self.vectors_path()) else {
            return Ok(false);
        };
        let Ok(header) = format::decode_header(&bytes) else {
            return Ok(false);
        };
        let staged_generation = fs::read_to_string(&staged)
            .ok()
            .and_then(|json| serde_json::from_str::<MetadataFile>(&json).ok())
            .and_then(|meta| Uuid::parse_str(&meta.generation).ok());
        if staged_generation != Some(header.generation) {
            return Ok(false);
        }

        fs::rename(&staged, self.metadata_path())?;
        tracing::warn!(
            generation = %header.generation,
            path = %self.root.display(),
            "completed interrupted snapshot write"
        );
        Ok(true)
    }

    /// Persist `index` as a new generation. Returns the generation written.
    pub fn write(&self, index: &MemoryIndex) -> Result<Uuid> {
        fs::create_dir_all(&self.root)?;
        if self.max_backups > 0 {
            backup::archive(&self.root)?;
        }

        let generation = Uuid::now_v7();
        let json = encode_ledger(index, generation)?;
        publish_pair(&self.root, &format::encode_vectors(index.vectors(), generation), &json)?;

        backup::rotate(&self.root, self.max_backups)?;
        tracing::info!(
            count = index.len(),
            generation = %generation,
            path = %self.root.display(),
            "snapshot written"
        );
        Ok(generation)
    }

    /// Backups newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        Ok(backup::list(&self.root)?)
    }

    /// Replace the live snapshot with a backup (newest when `name` is `None`).
    ///
    /// The backup must load cleanly first; the live pair is not archived, since
    /// restoring usually means it is the broken one.
    pub fn restore_backup(&self, name: Option<&str>) -> Result<(BackupInfo, MemoryIndex)> {
        let info = backup::find(&self.root, name)?.ok_or_else(|| {
            MemoryError::InvalidInput(match name {
                Some(name) => format!("no backup named {name}"),
                None => "no backups available".into(),
            })
        })?;
        let index = load_pair(&info.path.join(VECTORS_FILE), &info.path.join(METADATA_FILE))?
            .ok_or_else(|| MemoryError::corruption(&info.path, "backup is empty"))?;

        let vectors = fs::read(info.path.join(VECTORS_FILE))?;
        let metadata = fs::read(info.path.join(METADATA_FILE))?;
        publish_pair(&self.root, &vectors, &metadata)?;
        tracing::info!(backup = %info.name, count = index.len(), "restored snapshot from backup");
        Ok((info, index))
    }
}

fn encode_ledger(index: &MemoryIndex, generation: Uuid) -> Result<Vec<u8>> {
    let metadata = MetadataFile {
        format_version: FORMAT_VERSION,
        generation: generation.to_string(),
        next_id: index.next_id(),
        dimension: index.dimension(),
        records: index.records().to_vec(),
    };
    serde_json::to_vec_pretty(&metadata)
        .map_err(|e| MemoryError::InvalidInput(format!("failed to serialise ledger: {e}")))
}

/// Replace the live pair under `root`. Both files are staged before either is
/// renamed; a staging failure removes whatever was staged.
fn publish_pair(root: &Path, vectors: &[u8], metadata: &[u8]) -> io::Result<()> {
    let vectors_path = root.join(VECTORS_FILE);
    let metadata_path = root.join(METADATA_FILE);

    let staged = format::stage(&vectors_path, vectors)
        .and_then(|v| format::stage(&metadata_path, metadata).map(|m| (v, m)));
    let (staged_vectors, staged_metadata) = match staged {
        Ok(paths) => paths,
        Err(e) => {
            for path in [&vectors_path, &metadata_path] {
                let tmp = format::staged_path(path);
                if tmp.is_file() {
                    if let Err(cleanup) = fs::remove_file(&tmp) {
                        tracing::debug!(path = %tmp.display(), error = %cleanup, "failed to remove staged file");
                    }
                }
            }
            return Err(e);
        }
    };

    fs::rename(&staged_vectors, &vectors_path)?;
    fs::rename(&staged_metadata, &metadata_path)
}

/// Read and cross-check one snapshot pair.
fn load_pair(vectors_path: &Path, metadata_path: &Path) -> Result<Option<MemoryIndex>> {
    match (vectors_path.exists(), metadata_path.exists()) {
        (false, false) => return Ok(None),
        (true, false) => return Err(MemoryError::corruption(metadata_path, "file missing")),
        (false, true) => return Err(MemoryError::corruption(vectors_path, "file missing")),
        (true, true) => {}
    }

    let bytes = fs::read(vectors_path)?;
    let (header, vectors) =
        format::decode_vectors(&bytes).map_err(|reason| MemoryError::corruption(vectors_path, reason))?;

    let json = fs::read_to_string(metadata_path)?;
    let metadata: MetadataFile = serde_json::from_str(&json)
        .map_err(|e| MemoryError::corruption(metadata_path, e.to_string()))?;

    if metadata.format_version != FORMAT_VERSION {
        return Err(MemoryError::corruption(
            metadata_path,
            format!("unsupported format version {}", metadata.format_version),
        ));
    }
    let generation = Uuid::parse_str(&metadata.generation)
        .map_err(|e| MemoryError::corruption(metadata_path, format!("bad generation: {e}")))?;
    if generation != header.generation {
        return Err(MemoryError::corruption(
            metadata_path,
            format!(
                "generation {generation} does not match vectors generation {}",
                header.generation
            ),
        ));
    }
    if metadata.dimension != vectors.dimension() {
        return Err(MemoryError::corruption(
            metadata_path,
            format!(
                "dimension {:?} does not match vectors dimension {:?}",
                metadata.dimension,
                vectors.dimension()
            ),
        ));
    }
    if metadata
        .records
        .windows(2)
        .any(|pair| pair[0].id >= pair[1].id)
    {
        return Err(MemoryError::corruption(metadata_path, "record ids out of order"));
    }

    let index = MemoryIndex::from_parts(vectors, metadata.records, metadata.next_id)
        .map_err(|reason| MemoryError::corruption(metadata_path, reason))?;
    tracing::info!(count = index.len(), generation = %generation, "snapshot loaded");
    Ok(Some(index))
}
