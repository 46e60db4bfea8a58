//! Near-duplicate detection on insert.
//!
//! A new memory whose embedding scores at least the merge threshold against
//! its best existing match is folded into that record instead of appended.
//! The stored vector is never replaced by a merge, so repeated rephrasings
//! cannot drift the embedding away from the original.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::index::MemoryIndex;
use super::search;
use super::types::{Importance, MemoryRecord};
use crate::error::ProviderError;

/// What the policy decided for one candidate vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeDecision {
    Merge { position: usize, score: f32 },
    Append,
}

/// Decide between merging into the best match and appending.
pub fn decide(index: &MemoryIndex, vector: &[f32], threshold: f32) -> MergeDecision {
    match search::best_match(index, vector) {
        Some(best) if best.score >= threshold => MergeDecision::Merge {
            position: best.position,
            score: best.score,
        },
        _ => MergeDecision::Append,
    }
}

/// Fold a near-duplicate into an existing record.
///
/// The longer text (by character count) wins; importance takes the max, tags
/// the union, and the merge counts as one access. Returns whether the text
/// was replaced.
pub fn merge_into(
    record: &mut MemoryRecord,
    text: &str,
    importance: Importance,
    tags: BTreeSet<String>,
    now: DateTime<Utc>,
) -> bool {
    let replaced = text.chars().count() > record.text.chars().count();
    if replaced {
        record.text = text.to_string();
    }
    record.importance = record.importance.max(importance);
    record.tags.extend(tags);
    record.access_count = record.access_count.saturating_add(1);
    record.last_accessed_at = now;
    replaced
}

/// Outcome of [`insert_or_merge`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertEffect {
    pub id: u64,
    pub merged: bool,
}

/// Dedup gate followed by merge or append. Leaves the index untouched on error.
pub fn insert_or_merge(
    index: &mut MemoryIndex,
    text: &str,
    vector: &[f32],
    importance: Importance,
    tags: BTreeSet<String>,
    threshold: f32,
    now: DateTime<Utc>,
) -> Result<InsertEffect, ProviderError> {
    index.vectors().check(vector)?;

    match decide(index, vector, threshold) {
        MergeDecision::Merge { position, score } => {
            let record = index.record_mut(position);
            let replaced = merge_into(record, text, importance, tags, now);
            tracing::debug!(
                id = record.id,
                score,
                text_replaced = replaced,
                "merged near-duplicate memory"
            );
            Ok(InsertEffect {
                id: record.id,
                merged: true,
            })
        }
        MergeDecision::Append => {
            let id = index.append(text, vector, importance, tags, now)?;
            Ok(InsertEffect { id, merged: false })
        }
    }
}
