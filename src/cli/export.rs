use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use mnemo::config::MnemoConfig;
use mnemo::MemoryRecord;

/// Export format: the ledger without vectors.
#[derive(Debug, Serialize)]
struct ExportData {
    exported_at: DateTime<Utc>,
    dimension: Option<usize>,
    memories: Vec<MemoryRecord>,
}

/// Export all memories as JSON to stdout.
pub async fn export(config: &MnemoConfig) -> Result<()> {
    let store = super::open_store(config, false)?;
    let index = store.snapshot_index().await;

    let data = ExportData {
        exported_at: Utc::now(),
        dimension: index.dimension(),
        memories: index.records().to_vec(),
    };
    println!("{}", serde_json::to_string_pretty(&data)?);

    tracing::info!(count = data.memories.len(), "exported memories");
    Ok(())
}
