//! Retention scoring and capacity eviction.
//!
//! `score = importance_weight + recency_weight + frequency_weight`, computed
//! lazily from timestamps whenever eviction needs it. Recency halves every
//! `half_life_hours`; frequency grows with `ln(1 + access_count)`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::index::MemoryIndex;
use super::types::{Importance, MemoryRecord};
use crate::config::RetentionConfig;
use crate::error::MemoryError;

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    config: RetentionConfig,
}

impl RetentionPolicy {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub fn importance_weight(&self, importance: Importance) -> f64 {
        self.config.importance_weight(importance)
    }

    /// Decreasing in elapsed time, bounded by `recency_scale`. Negative spans count as zero.
    pub fn recency_weight(&self, elapsed: chrono::Duration) -> f64 {
        let hours = (elapsed.num_milliseconds().max(0) as f64) / 3_600_000.0;
        self.config.recency_scale * 0.5f64.powf(hours / self.config.half_life_hours)
    }

    pub fn frequency_weight(&self, access_count: u32) -> f64 {
        self.config.frequency_scale * (1.0 + access_count as f64).ln()
    }

    pub fn score(&self, record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
        self.importance_weight(record.importance)
            + self.recency_weight(now - record.last_accessed_at)
            + self.frequency_weight(record.access_count)
    }

    /// Position of the record to evict next: lowest score, then oldest
    /// `created_at`, then lowest id.
    pub fn eviction_candidate(&self, index: &MemoryIndex, now: DateTime<Utc>) -> Option<usize> {
        index
            .records()
            .iter()
            .enumerate()
            .map(|(position, record)| (position, record, self.score(record, now)))
            .min_by(|(_, ra, sa), (_, rb, sb)| {
                sa.partial_cmp(sb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| ra.created_at.cmp(&rb.created_at))
                    .then_with(|| ra.id.cmp(&rb.id))
            })
            .map(|(position, _, _)| position)
    }

    /// Evict one record at a time until the index fits. Returns the evicted records.
    pub fn enforce_capacity(
        &self,
        index: &mut MemoryIndex,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let capacity = self.config.capacity;
        let mut evicted = Vec::new();

        while index.len() > capacity {
            let before = index.len();
            let Some(position) = self.eviction_candidate(index, now) else {
                break;
            };
            let record = index.remove_at(position);
            tracing::info!(
                id = record.id,
                score = self.score(&record, now),
                remaining = index.len(),
                "evicted memory"
            );
            evicted.push(record);
            if index.len() >= before {
                break;
            }
        }

        if index.len() > capacity {
            return Err(MemoryError::CapacityInvariant {
                size: index.len(),
                capacity,
            });
        }
        Ok(evicted)
    }
}
