//! Store upkeep that runs on request: pruning stale trivia and re-applying
//! the merge policy across the whole store.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::index::MemoryIndex;
use super::search;
use super::types::{Importance, MemoryRecord};
use crate::config::RetentionConfig;

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PruneReport {
    pub candidates: Vec<PruneCandidate>,
    pub removed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct PruneCandidate {
    pub id: u64,
    pub importance: Importance,
    pub access_count: u32,
    pub text_preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConsolidateReport {
    pub merges: Vec<ConsolidatedPair>,
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct ConsolidatedPair {
    pub kept: u64,
    pub absorbed: u64,
    pub score: f32,
}

/// Truncate content to max_chars, appending "..." if truncated.
pub fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let head: String = content.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

// ── Pruning ──────────────────────────────────────────────────────────────────

/// Stale: older than `prune_after_days`, low importance, and rarely recalled.
///
/// A window that does not fit in the calendar marks nothing stale, and neither
/// does a non-positive one.
fn is_stale(record: &MemoryRecord, config: &RetentionConfig, now: DateTime<Utc>) -> bool {
    if config.prune_after_days <= 0 {
        return false;
    }
    let Some(cutoff) = TimeDelta::try_days(config.prune_after_days)
        .and_then(|window| now.checked_sub_signed(window))
    else {
        return false;
    };
    record.created_at < cutoff
        && record.importance < Importance::Normal
        && record.access_count < config.prune_min_accesses
}

/// Find and optionally remove stale memories.
///
/// Independent of capacity: a store well under its limit can still shed
/// old trivia. In dry_run mode, returns candidates without removing.
pub fn prune(
    index: &mut MemoryIndex,
    config: &RetentionConfig,
    now: DateTime<Utc>,
    dry_run: bool,
) -> PruneReport {
    let stale: Vec<u64> = index
        .records()
        .iter()
        .filter(|r| is_stale(r, config, now))
        .map(|r| r.id)
        .collect();

    let candidates: Vec<PruneCandidate> = stale
        .iter()
        .filter_map(|id| index.get(*id))
        .map(|r| PruneCandidate {
            id: r.id,
            importance: r.importance,
            access_count: r.access_count,
            text_preview: truncate(&r.text, 80),
            created_at: r.created_at,
        })
        .collect();

    if dry_run {
        return PruneReport {
            candidates,
            removed: 0,
            dry_run: true,
        };
    }

    let mut removed = 0;
    for id in &stale {
        if index.remove_by_id(*id).is_some() {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, remaining = index.len(), "pruned stale memories");
    }

    PruneReport {
        candidates,
        removed,
        dry_run: false,
    }
}

// ── Consolidation ────────────────────────────────────────────────────────────

/// Fold `absorbed` into `kept`: longer text, max importance, union of tags,
/// summed access counts, earliest creation, latest access.
fn absorb(kept: &mut MemoryRecord, absorbed: MemoryRecord) {
    if absorbed.text.chars().count() > kept.text.chars().count() {
        kept.text = absorbed.text;
    }
    kept.importance = kept.importance.max(absorbed.importance);
    kept.tags.extend(absorbed.tags);
    kept.access_count = kept.access_count.saturating_add(absorbed.access_count);
    kept.created_at = kept.created_at.min(absorbed.created_at);
    kept.last_accessed_at = kept.last_accessed_at.max(absorbed.last_accessed_at);
}

/// Re-apply the merge policy pairwise across the whole store.
///
/// Needed after the threshold is lowered, or after importing records that were
/// never deduplicated. The earlier row survives and keeps its vector; later
/// near-duplicates are absorbed and compacted out. Afterwards every pair scores
/// below `threshold`.
pub fn consolidate(index: &mut MemoryIndex, threshold: f32) -> ConsolidateReport {
    let mut merges = Vec::new();

    let mut i = 0;
    while i < index.len() {
        let mut j = i + 1;
        while j < index.len() {
            let score = search::row_similarity(index, i, j);
            if score >= threshold {
                let absorbed = index.remove_at(j);
                let absorbed_id = absorbed.id;
                let kept = index.record_mut(i);
                absorb(kept, absorbed);
                merges.push(ConsolidatedPair {
                    kept: kept.id,
                    absorbed: absorbed_id,
                    score,
                });
            } else {
                j += 1;
            }
        }
        i += 1;
    }

    if !merges.is_empty() {
        tracing::info!(merged = merges.len(), remaining = index.len(), "consolidated memories");
    }

    ConsolidateReport {
        merges,
        remaining: index.len(),
    }
}
