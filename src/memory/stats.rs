use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::index::MemoryIndex;
use super::types::Importance;

/// Response from `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub capacity: usize,
    /// `None` until the first vector is written.
    pub dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_created_at: Option<DateTime<Utc>>,
    pub by_importance: BTreeMap<String, usize>,
    pub average_access_count: f64,
}

/// Compute store statistics.
pub fn store_stats(index: &MemoryIndex, capacity: usize) -> StoreStats {
    let records = index.records();

    let mut by_importance: BTreeMap<String, usize> = Importance::ALL
        .iter()
        .map(|level| (level.to_string(), 0))
        .collect();
    for record in records {
        *by_importance.entry(record.importance.to_string()).or_default() += 1;
    }

    let average_access_count = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.access_count as f64).sum::<f64>() / records.len() as f64
    };

    StoreStats {
        count: records.len(),
        capacity,
        dimension: index.dimension(),
        oldest_created_at: records.iter().map(|r| r.created_at).min(),
        newest_created_at: records.iter().map(|r| r.created_at).max(),
        by_importance,
        average_access_count,
    }
}
