//! Exact cosine-similarity ranking over the vector store.
//!
//! Every query is a linear scan; at the configured capacity that is cheaper
//! than keeping an approximate index and gives deterministic rankings.
//! Ordering: score descending, then most recently accessed, then lowest id.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use ndarray::ArrayView1;

use super::index::MemoryIndex;
use super::types::MemoryRecord;

/// A ranked row of the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub position: usize,
    pub score: f32,
}

/// Restricts a ranking to records carrying at least one of a set of tags.
///
/// The empty filter admits every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: BTreeSet<String>,
}

impl TagFilter {
    pub fn any_of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self { tags }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn admits(&self, record: &MemoryRecord) -> bool {
        self.tags.is_empty() || !self.tags.is_disjoint(&record.tags)
    }
}

/// Cosine similarity of two equal-length vectors. Zero-norm input scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine(ArrayView1::from(a), ArrayView1::from(b))
}

fn cosine(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Similarity between two stored rows.
pub(crate) fn row_similarity(index: &MemoryIndex, a: usize, b: usize) -> f32 {
    cosine(index.vectors().row(a), index.vectors().row(b))
}

/// Score every stored vector against `query`, unsorted.
fn score_all(index: &MemoryIndex, query: &[f32]) -> Vec<ScoredRow> {
    let query = ArrayView1::from(query);
    index
        .vectors()
        .iter()
        .enumerate()
        .map(|(position, row)| ScoredRow {
            position,
            score: cosine(row, query),
        })
        .collect()
}

/// Total order used for every ranking.
fn rank(index: &MemoryIndex, a: &ScoredRow, b: &ScoredRow) -> Ordering {
    let ra = &index.records()[a.position];
    let rb = &index.records()[b.position];
    b.score
        .total_cmp(&a.score)
        .then_with(|| rb.last_accessed_at.cmp(&ra.last_accessed_at))
        .then_with(|| ra.id.cmp(&rb.id))
}

/// Rows whose record passes `filter`, unsorted.
fn score_filtered(index: &MemoryIndex, query: &[f32], filter: &TagFilter) -> Vec<ScoredRow> {
    let mut scored = score_all(index, query);
    if !filter.is_empty() {
        scored.retain(|row| filter.admits(&index.records()[row.position]));
    }
    scored
}

/// Up to `k` rows passing `filter`, best first.
pub fn top_k(index: &MemoryIndex, query: &[f32], k: usize, filter: &TagFilter) -> Vec<ScoredRow> {
    if k == 0 || index.is_empty() {
        return Vec::new();
    }
    let mut scored = score_filtered(index, query, filter);
    scored.sort_by(|a, b| rank(index, a, b));
    scored.truncate(k);
    scored
}

/// Every row passing `filter` and scoring at least `threshold`, best first.
pub fn above_threshold(
    index: &MemoryIndex,
    query: &[f32],
    threshold: f32,
    filter: &TagFilter,
) -> Vec<ScoredRow> {
    let mut scored: Vec<ScoredRow> = score_filtered(index, query, filter)
        .into_iter()
        .filter(|row| row.score >= threshold)
        .collect();
    scored.sort_by(|a, b| rank(index, a, b));
    scored
}

/// The single best row, if the store is not empty.
pub fn best_match(index: &MemoryIndex, query: &[f32]) -> Option<ScoredRow> {
    score_all(index, query)
        .into_iter()
        .min_by(|a, b| rank(index, a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Importance;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::BTreeSet;

    fn t0() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn index_with(vectors: &[&[f32]]) -> MemoryIndex {
        let mut index = MemoryIndex::new();
        for (i, v) in vectors.iter().enumerate() {
            index
                .append(&format!("m{i}"), v, Importance::Normal, BTreeSet::new(), t0())
                .unwrap();
        }
        index
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
        // scale invariant
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn empty_store_returns_nothing() {
        let index = MemoryIndex::new();
        assert!(top_k(&index, &[1.0, 0.0], 5, &TagFilter::default()).is_empty());
        assert!(above_threshold(&index, &[1.0, 0.0], -1.0, &TagFilter::default()).is_empty());
        assert!(best_match(&index, &[1.0, 0.0]).is_none());
    }

    #[test]
    fn top_k_orders_by_descending_score() {
        let index = index_with(&[&[0.0, 1.0], &[1.0, 0.0], &[1.0, 1.0]]);
        let rows = top_k(&index, &[1.0, 0.1], 2, &TagFilter::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[1].position, 2);
        assert!(rows[0].score >= rows[1].score);
    }

    #[test]
    fn ties_prefer_recent_access_then_lowest_id() {
        let mut index = index_with(&[&[1.0, 0.0], &[2.0, 0.0], &[3.0, 0.0]]);

        // all identical scores and timestamps: lowest id first
        let rows = top_k(&index, &[1.0, 0.0], 3, &TagFilter::default());
        let ids: Vec<u64> = rows.iter().map(|r| index.records()[r.position].id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // touching id 3 moves it to the front
        index.record_mut(2).last_accessed_at = t0() + Duration::minutes(5);
        let rows = top_k(&index, &[1.0, 0.0], 3, &TagFilter::default());
        let ids: Vec<u64> = rows.iter().map(|r| index.records()[r.position].id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(best_match(&index, &[1.0, 0.0]).unwrap().position, 2);
    }

    #[test]
    fn threshold_query_is_inclusive() {
        let index = index_with(&[&[1.0, 0.0], &[0.0, 1.0], &[1.0, 1.0]]);
        let rows = above_threshold(&index, &[1.0, 0.0], 0.7, &TagFilter::default());
        let positions: Vec<usize> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 2]);

        let exact = above_threshold(&index, &[1.0, 0.0], 1.0, &TagFilter::default());
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn tag_filter_applies_before_truncation() {
        let mut index = MemoryIndex::new();
        let tagged = |tags: &[&str]| -> BTreeSet<String> { tags.iter().map(|t| t.to_string()).collect() };
        index.append("closest", &[1.0, 0.0], Importance::Normal, tagged(&["work"]), t0()).unwrap();
        index.append("second", &[0.9, 0.1], Importance::Normal, tagged(&["family"]), t0()).unwrap();
        index.append("third", &[0.5, 0.5], Importance::Normal, tagged(&["family", "health"]), t0()).unwrap();

        let family = TagFilter::any_of([" family "]);
        let rows = top_k(&index, &[1.0, 0.0], 1, &family);
        assert_eq!(rows.len(), 1);
        assert_eq!(index.records()[rows[0].position].text, "second");

        let either = TagFilter::any_of(["health", "work"]);
        let rows = above_threshold(&index, &[1.0, 0.0], 0.0, &either);
        let texts: Vec<&str> = rows.iter().map(|r| index.records()[r.position].text.as_str()).collect();
        assert_eq!(texts, vec!["closest", "third"]);

        assert!(TagFilter::any_of(["", "  "]).is_empty());
        assert!(top_k(&index, &[1.0, 0.0], 3, &TagFilter::any_of(["unknown"])).is_empty());
    }
}
