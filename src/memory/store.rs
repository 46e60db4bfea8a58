//! The owned store handle: embedding, locking, and persistence around the index.
//!
//! [`MemoryStore`] is the single entry point for callers. Every operation embeds
//! (if it needs to) before taking any lock, then commits against the
//! [`MemoryIndex`] under the write lock: dedup check, append or merge, eviction.
//! A failed embedding therefore leaves no trace. With `autosave` on, every
//! successful mutation is followed by a snapshot write.
//!
//! Durability is reported by [`MemoryStore::flush`] and [`MemoryStore::close`].
//! A failed autosave keeps the store dirty and is retried by the next flush;
//! `remember` also reports it through [`RememberOutcome::persisted`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use super::context;
use super::dedup;
use super::index::MemoryIndex;
use super::maintenance::{self, ConsolidateReport, PruneReport};
use super::retention::RetentionPolicy;
use super::search::{self, ScoredRow, TagFilter};
use super::stats::{store_stats, StoreStats};
use super::types::{Importance, MemoryRecord, RecallMatch, RememberOutcome};
use crate::config::MnemoConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, ProviderError, Result};
use crate::snapshot::backup::BackupInfo;
use crate::snapshot::SnapshotDir;

/// Matches considered for a context block.
const CONTEXT_MATCHES: usize = 15;
/// Matches scoring below this are left out of context blocks.
const CONTEXT_MIN_SCORE: f32 = 0.3;

#[derive(Debug, Clone)]
struct StoreSettings {
    dedup_threshold: f32,
    default_k: usize,
    embed_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    autosave: bool,
}

impl StoreSettings {
    fn from_config(config: &MnemoConfig) -> Self {
        Self {
            dedup_threshold: config.retrieval.dedup_threshold,
            default_k: config.retrieval.default_k,
            embed_timeout: Duration::from_millis(config.embedding.timeout_ms.max(1)),
            max_retries: config.embedding.max_retries,
            retry_backoff: Duration::from_millis(config.embedding.retry_backoff_ms),
            autosave: config.storage.autosave,
        }
    }
}

pub struct MemoryStore {
    index: RwLock<MemoryIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    policy: RetentionPolicy,
    settings: StoreSettings,
    snapshot: Option<SnapshotDir>,
    /// Serialises snapshot writes.
    flush_lock: Mutex<()>,
    /// Set by every mutation, cleared when a flush starts.
    dirty: AtomicBool,
}

impl MemoryStore {
    /// Load the snapshot in the configured data directory, or start empty.
    ///
    /// A corrupt snapshot is an error; callers decide whether to restore a
    /// backup or start over.
    pub fn open(config: &MnemoConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let dir = SnapshotDir::new(config.resolved_data_dir(), config.storage.max_backups);
        let index = dir.load()?.unwrap_or_default();
        let mut store = Self::from_index(index, provider, config, Some(dir));
        store.shrink_to_capacity()?;
        Ok(store)
    }

    /// A store that never touches disk.
    pub fn in_memory(config: &MnemoConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_index(MemoryIndex::new(), provider, config, None))
    }

    fn from_index(
        index: MemoryIndex,
        provider: Arc<dyn EmbeddingProvider>,
        config: &MnemoConfig,
        snapshot: Option<SnapshotDir>,
    ) -> Self {
        tracing::info!(
            count = index.len(),
            capacity = config.retention.capacity,
            provider = provider.name(),
            persistent = snapshot.is_some(),
            "memory store opened"
        );
        Self {
            index: RwLock::new(index),
            provider,
            policy: RetentionPolicy::new(config.retention.clone()),
            settings: StoreSettings::from_config(config),
            snapshot,
            flush_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    /// A snapshot written under a larger capacity is trimmed on open.
    fn shrink_to_capacity(&mut self) -> Result<()> {
        let index = self.index.get_mut();
        if index.len() > self.policy.capacity() {
            let evicted = self.policy.enforce_capacity(index, Utc::now())?;
            tracing::info!(evicted = evicted.len(), "trimmed loaded snapshot to capacity");
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    pub fn default_k(&self) -> usize {
        self.settings.default_k
    }

    pub fn capacity(&self) -> usize {
        self.policy.capacity()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    // ── Embedding ────────────────────────────────────────────────────────────

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let provider = Arc::clone(&self.provider);
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || provider.embed(&text));
        match tokio::time::timeout(self.settings.embed_timeout, task).await {
            Err(_) => Err(ProviderError::Timeout(self.settings.embed_timeout.as_millis() as u64)),
            Ok(Err(join)) => Err(ProviderError::Task(join.to_string())),
            Ok(Ok(result)) => result,
        }
    }

    /// Embed with bounded retries and exponential backoff.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            match self.embed_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = self
                        .settings
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    tracing::warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "embedding failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Store a memory, merging it into a near-duplicate if one exists.
    ///
    /// A fresh insert that pushes the store over capacity evicts the
    /// lowest-retention records, which may include the new one.
    pub async fn remember(
        &self,
        text: &str,
        importance: Importance,
        tags: &[&str],
    ) -> Result<RememberOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MemoryError::InvalidInput("memory text is empty".into()));
        }
        let tags = normalize_tags(tags);

        let vector = self.embed(text).await?;

        let mut outcome = {
            let mut index = self.index.write().await;
            let now = Utc::now();
            let effect = dedup::insert_or_merge(
                &mut index,
                text,
                &vector,
                importance,
                tags,
                self.settings.dedup_threshold,
                now,
            )?;
            let evicted = if effect.merged {
                Vec::new()
            } else {
                self.policy.enforce_capacity(&mut index, now)?
            };
            RememberOutcome {
                id: effect.id,
                merged: effect.merged,
                evicted: evicted.iter().map(|r| r.id).collect(),
                persisted: false,
            }
        };

        tracing::info!(
            id = outcome.id,
            merged = outcome.merged,
            evicted = outcome.evicted.len(),
            "remembered"
        );
        outcome.persisted = self.mark_dirty().await;
        Ok(outcome)
    }

    /// The `k` most similar memories, best first. Each returned record counts
    /// as one access.
    pub async fn recall(&self, query: &str, k: usize) -> Result<Vec<RecallMatch>> {
        self.recall_tagged(query, k, &[]).await
    }

    /// Like [`recall`](Self::recall), restricted to memories carrying at least
    /// one of `tags`. An empty tag list matches everything.
    pub async fn recall_tagged(
        &self,
        query: &str,
        k: usize,
        tags: &[&str],
    ) -> Result<Vec<RecallMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let filter = TagFilter::any_of(tags);
        self.recall_ranked(query, |index, vector| search::top_k(index, vector, k, &filter))
            .await
    }

    /// Every memory scoring at least `threshold`, best first.
    pub async fn recall_above(&self, query: &str, threshold: f32) -> Result<Vec<RecallMatch>> {
        self.recall_above_tagged(query, threshold, &[]).await
    }

    pub async fn recall_above_tagged(
        &self,
        query: &str,
        threshold: f32,
        tags: &[&str],
    ) -> Result<Vec<RecallMatch>> {
        let filter = TagFilter::any_of(tags);
        self.recall_ranked(query, |index, vector| {
            search::above_threshold(index, vector, threshold, &filter)
        })
        .await
    }

    /// A markdown block of the memories relevant to `query`, grouped by tag and
    /// at most `max_chars` long. Empty when nothing relevant is stored.
    ///
    /// Every match considered counts as an access, as with `recall`.
    pub async fn context(&self, query: &str, max_chars: usize) -> Result<String> {
        let matches = self
            .recall_ranked(query, |index, vector| {
                let mut rows = search::top_k(index, vector, CONTEXT_MATCHES, &TagFilter::default());
                rows.retain(|row| row.score >= CONTEXT_MIN_SCORE);
                rows
            })
            .await?;
        Ok(context::render(&matches, max_chars))
    }

    async fn recall_ranked<F>(&self, query: &str, rank: F) -> Result<Vec<RecallMatch>>
    where
        F: FnOnce(&MemoryIndex, &[f32]) -> Vec<ScoredRow>,
    {
        let query = query.trim();
        if query.is_empty() {
            return Err(MemoryError::InvalidInput("query is empty".into()));
        }
        if self.index.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embed(query).await?;

        let matches = {
            let mut index = self.index.write().await;
            index.vectors().check(&vector)?;
            let rows = rank(&index, &vector);
            let now = Utc::now();
            rows.iter()
                .map(|row| {
                    let record = index.record_mut(row.position);
                    record.access_count = record.access_count.saturating_add(1);
                    record.last_accessed_at = now;
                    RecallMatch::from_record(record, row.score)
                })
                .collect::<Vec<_>>()
        };

        tracing::debug!(results = matches.len(), "recall");
        if !matches.is_empty() {
            self.mark_dirty().await;
        }
        Ok(matches)
    }

    /// Remove a memory. Returns `false` if the id is unknown.
    pub async fn forget(&self, id: u64) -> Result<bool> {
        let removed = self.index.write().await.remove_by_id(id);
        match removed {
            Some(record) => {
                tracing::info!(id = record.id, "forgot memory");
                self.mark_dirty().await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn get(&self, id: u64) -> Result<MemoryRecord> {
        self.index
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(MemoryError::NotFound(id))
    }

    /// Most recently created memories first.
    pub async fn list_recent(&self, limit: usize) -> Vec<MemoryRecord> {
        let index = self.index.read().await;
        let mut records = index.records().to_vec();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        records.truncate(limit);
        records
    }

    pub async fn stats(&self) -> StoreStats {
        store_stats(&*self.index.read().await, self.policy.capacity())
    }

    /// Drop stale, unimportant, rarely recalled memories.
    pub async fn prune(&self, dry_run: bool) -> Result<PruneReport> {
        let report = {
            let mut index = self.index.write().await;
            maintenance::prune(&mut index, self.policy.config(), Utc::now(), dry_run)
        };
        if report.removed > 0 {
            self.mark_dirty().await;
        }
        Ok(report)
    }

    /// Merge every stored pair at or above the dedup threshold.
    pub async fn consolidate(&self) -> Result<ConsolidateReport> {
        let report = {
            let mut index = self.index.write().await;
            maintenance::consolidate(&mut index, self.settings.dedup_threshold)
        };
        if !report.merges.is_empty() {
            self.mark_dirty().await;
        }
        Ok(report)
    }

    /// A copy of the whole index, for export.
    pub async fn snapshot_index(&self) -> MemoryIndex {
        self.index.read().await.clone()
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Record a mutation and autosave if enabled. Returns whether the change
    /// is now on disk.
    async fn mark_dirty(&self) -> bool {
        self.dirty.store(true, Ordering::SeqCst);
        if !self.settings.autosave || self.snapshot.is_none() {
            return false;
        }
        match self.flush().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "autosave failed, will retry on next flush");
                false
            }
        }
    }

    /// Whether there are mutations not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Write a snapshot of the current index. No-op for in-memory stores.
    pub async fn flush(&self) -> Result<()> {
        let Some(dir) = self.snapshot.clone() else {
            return Ok(());
        };
        let _guard = self.flush_lock.lock().await;
        self.dirty.store(false, Ordering::SeqCst);
        let index = self.index.read().await.clone();

        let written = tokio::task::spawn_blocking(move || dir.write(&index))
            .await
            .map_err(|e| MemoryError::Io(std::io::Error::other(e.to_string())))
            .and_then(|result| result);
        if let Err(e) = written {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    /// Flush pending changes and release the store.
    pub async fn close(self) -> Result<()> {
        if self.is_dirty() {
            self.flush().await?;
        }
        tracing::info!("memory store closed");
        Ok(())
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let dir = self.require_snapshot()?;
        tokio::task::spawn_blocking(move || dir.list_backups())
            .await
            .map_err(|e| MemoryError::Io(std::io::Error::other(e.to_string())))?
    }

    /// Replace the in-memory index and the live snapshot with a backup.
    ///
    /// The write lock is held from before the files are touched until the new
    /// index is in place, so no mutation can land in between and be lost.
    pub async fn restore_backup(&self, name: Option<&str>) -> Result<BackupInfo> {
        let dir = self.require_snapshot()?;
        let name = name.map(str::to_string);
        let _guard = self.flush_lock.lock().await;
        let mut index = self.index.write().await;
        let (info, restored) = tokio::task::spawn_blocking(move || dir.restore_backup(name.as_deref()))
            .await
            .map_err(|e| MemoryError::Io(std::io::Error::other(e.to_string())))??;

        *index = restored;
        self.dirty.store(false, Ordering::SeqCst);
        tracing::info!(backup = %info.name, count = index.len(), "store restored from backup");
        Ok(info)
    }

    fn require_snapshot(&self) -> Result<SnapshotDir> {
        self.snapshot
            .clone()
            .ok_or_else(|| MemoryError::InvalidInput("store has no data directory".into()))
    }
}

fn normalize_tags(tags: &[&str]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
