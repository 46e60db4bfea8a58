//! Core memory type definitions.
//!
//! Defines [`Importance`] (the retention ordinal), [`MemoryRecord`] (one row of
//! the metadata ledger), and the shapes returned to callers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How strongly a memory resists eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub const ALL: [Importance; 3] = [Importance::Low, Importance::Normal, Importance::High];
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(format!("unknown importance: {s}")),
        }
    }
}

/// One remembered fact, index-aligned with its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryRecord {
    /// Assigned at creation, never reused.
    pub id: u64,
    /// The natural-language content. Merges may replace it with a longer phrasing.
    pub text: String,
    /// Row of this record's embedding in the vector store.
    pub embedding_ref: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Incremented by every recall that returns this record and by every merge into it.
    pub access_count: u32,
    pub importance: Importance,
    pub tags: BTreeSet<String>,
}

/// One ranked result from `recall`.
#[derive(Debug, Clone, Serialize)]
pub struct RecallMatch {
    pub id: u64,
    pub text: String,
    pub score: f32,
    pub importance: Importance,
    pub tags: BTreeSet<String>,
}

impl RecallMatch {
    pub(crate) fn from_record(record: &MemoryRecord, score: f32) -> Self {
        Self {
            id: record.id,
            text: record.text.clone(),
            score,
            importance: record.importance,
            tags: record.tags.clone(),
        }
    }
}

/// Result returned from a remember operation.
#[derive(Debug, Clone, Serialize)]
pub struct RememberOutcome {
    /// ID of the new record, or of the existing record the text was merged into.
    pub id: u64,
    /// `true` if an existing near-duplicate absorbed the text.
    pub merged: bool,
    /// IDs removed by capacity eviction during this insert.
    pub evicted: Vec<u64>,
    /// `true` if the change was written to disk before returning. Always
    /// `false` for in-memory stores and with autosave off.
    pub persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_orders_low_to_high() {
        assert!(Importance::Low < Importance::Normal);
        assert!(Importance::Normal < Importance::High);
        assert_eq!(Importance::default(), Importance::Normal);
    }

    #[test]
    fn importance_parses_and_displays() {
        for level in Importance::ALL {
            let parsed: Importance = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
        assert!("urgent".parse::<Importance>().is_err());
    }

    #[test]
    fn record_rejects_missing_fields() {
        let json = r#"{"id": 1, "text": "no timestamps"}"#;
        assert!(serde_json::from_str::<MemoryRecord>(json).is_err());
    }
}
