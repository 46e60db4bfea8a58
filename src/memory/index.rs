//! The metadata ledger and its vector store, kept index-aligned.
//!
//! [`MemoryIndex`] is the only place that adds or removes rows. Every record's
//! `embedding_ref` equals its position in the ledger, and the ledger and the
//! vector store always have the same length once a method returns.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use super::types::{Importance, MemoryRecord};
use super::vectors::VectorStore;
use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct MemoryIndex {
    vectors: VectorStore,
    records: Vec<MemoryRecord>,
    next_id: u64,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            vectors: VectorStore::new(),
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Reassemble an index from persisted parts, checking every alignment rule.
    ///
    /// Returns a human-readable reason on failure; the snapshot layer turns it
    /// into a corruption error.
    pub fn from_parts(
        vectors: VectorStore,
        records: Vec<MemoryRecord>,
        next_id: u64,
    ) -> Result<Self, String> {
        if vectors.len() != records.len() {
            return Err(format!(
                "{} vectors but {} metadata records",
                vectors.len(),
                records.len()
            ));
        }
        let mut seen = HashSet::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.embedding_ref != position {
                return Err(format!(
                    "record {} has embedding_ref {} at position {position}",
                    record.id, record.embedding_ref
                ));
            }
            if !seen.insert(record.id) {
                return Err(format!("duplicate record id {}", record.id));
            }
            if record.id >= next_id {
                return Err(format!(
                    "record id {} is not below next_id {next_id}",
                    record.id
                ));
            }
        }
        Ok(Self {
            vectors,
            records,
            next_id,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vectors.dimension()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    pub fn position(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: u64) -> Option<&MemoryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub(crate) fn record_mut(&mut self, position: usize) -> &mut MemoryRecord {
        &mut self.records[position]
    }

    /// Append a fresh record and its vector. Returns the new id.
    pub(crate) fn append(
        &mut self,
        text: &str,
        vector: &[f32],
        importance: Importance,
        tags: BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<u64, ProviderError> {
        let embedding_ref = self.vectors.push(vector)?;
        let id = self.next_id;
        self.next_id += 1;
        self.records.push(MemoryRecord {
            id,
            text: text.to_string(),
            embedding_ref,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            importance,
            tags,
        });
        debug_assert!(self.is_aligned());
        Ok(id)
    }

    /// Remove the row at `position` from both containers and compact.
    pub(crate) fn remove_at(&mut self, position: usize) -> MemoryRecord {
        self.vectors.remove(position);
        let removed = self.records.remove(position);
        for record in &mut self.records[position..] {
            record.embedding_ref -= 1;
        }
        debug_assert!(self.is_aligned());
        removed
    }

    pub(crate) fn remove_by_id(&mut self, id: u64) -> Option<MemoryRecord> {
        let position = self.position(id)?;
        Some(self.remove_at(position))
    }

    /// Both containers have equal length and every `embedding_ref` is its own position.
    pub fn is_aligned(&self) -> bool {
        self.vectors.len() == self.records.len()
            && self
                .records
                .iter()
                .enumerate()
                .all(|(position, r)| r.embedding_ref == position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        "2026-01-01T00:00:00Z".parse().unwrap()
    }

    fn filled(n: usize) -> MemoryIndex {
        let mut index = MemoryIndex::new();
        for i in 0..n {
            let mut v = vec![0.0f32; 8];
            v[i % 8] = 1.0;
            index
                .append(&format!("memory {i}"), &v, Importance::Normal, BTreeSet::new(), t0())
                .unwrap();
        }
        index
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let index = filled(3);
        let ids: Vec<u64> = index.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(index.next_id(), 4);
        assert!(index.is_aligned());
    }

    #[test]
    fn remove_compacts_both_containers() {
        let mut index = filled(4);
        let removed = index.remove_by_id(2).unwrap();
        assert_eq!(removed.text, "memory 1");
        assert_eq!(index.len(), 3);
        assert_eq!(index.vectors().len(), 3);
        assert!(index.is_aligned());

        // vector that belonged to id 3 moved up to row 1
        let pos = index.position(3).unwrap();
        assert_eq!(pos, 1);
        assert_eq!(index.vectors().row(pos)[2], 1.0);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut index = filled(2);
        index.remove_by_id(2).unwrap();
        let id = index
            .append("again", &[0.5f32; 8], Importance::Low, BTreeSet::new(), t0())
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn failed_append_leaves_index_untouched() {
        let mut index = filled(2);
        let err = index.append("bad", &[1.0, 2.0], Importance::Normal, BTreeSet::new(), t0());
        assert!(err.is_err());
        assert_eq!(index.len(), 2);
        assert_eq!(index.next_id(), 3);
        assert!(index.is_aligned());
    }

    #[test]
    fn from_parts_rejects_misalignment() {
        let index = filled(2);
        let mut records = index.records().to_vec();

        let short = VectorStore::from_flat(8, vec![0.0; 8]).unwrap();
        assert!(MemoryIndex::from_parts(short, records.clone(), 3).is_err());

        records[1].embedding_ref = 5;
        assert!(MemoryIndex::from_parts(index.vectors().clone(), records.clone(), 3).is_err());

        records[1].embedding_ref = 1;
        records[1].id = records[0].id;
        assert!(MemoryIndex::from_parts(index.vectors().clone(), records.clone(), 3).is_err());

        records[1].id = 2;
        assert!(MemoryIndex::from_parts(index.vectors().clone(), records.clone(), 2).is_err());
        assert!(MemoryIndex::from_parts(index.vectors().clone(), records, 3).is_ok());
    }
}
