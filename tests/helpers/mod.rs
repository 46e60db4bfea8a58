#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mnemo::config::MnemoConfig;
use mnemo::embedding::hashed::HashedEmbeddingProvider;
use mnemo::embedding::EmbeddingProvider;
use mnemo::error::ProviderError;
use mnemo::MemoryStore;

pub const DIM: usize = 64;

/// Defaults with fast retries, persisting under `data_dir`.
pub fn test_config(data_dir: &Path) -> MnemoConfig {
    let mut config = MnemoConfig::default();
    config.storage.data_dir = data_dir.to_string_lossy().into_owned();
    config.embedding.provider = "hashed".into();
    config.embedding.dimensions = DIM;
    config.embedding.retry_backoff_ms = 1;
    config.embedding.timeout_ms = 2_000;
    config
}

/// Same as [`test_config`] with a different capacity.
pub fn config_with_capacity(data_dir: &Path, capacity: usize) -> MnemoConfig {
    let mut config = test_config(data_dir);
    config.retention.capacity = capacity;
    config
}

pub fn hashed() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashedEmbeddingProvider::new(DIM))
}

/// In-memory store backed by the hashing embedder.
pub fn memory_store() -> MemoryStore {
    MemoryStore::in_memory(&test_config(Path::new("/nonexistent")), hashed()).unwrap()
}

/// Generate a deterministic embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed as usize % DIM] = 1.0;
    v
}

/// Generate an embedding similar to `base` with small perturbation.
/// The result will have cosine similarity above 0.99 to `base`.
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for i in 0..5 {
        v[(i * 13) % DIM] += 0.05;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in &mut v {
        *x /= norm;
    }
    v
}

/// Returns pre-registered vectors for exact texts and counts calls.
#[derive(Default)]
pub struct ScriptedProvider {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Arc<Self> {
        let provider = Self::default();
        for (text, vector) in entries {
            provider.set(text, vector.clone());
        }
        Arc::new(provider)
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        self.vectors.lock().unwrap().insert(text.to_string(), vector);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for ScriptedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no scripted vector for {text:?}")))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Fails the first `failures` calls with the given status, then delegates to
/// the hashing embedder.
pub struct FlakyProvider {
    failures: usize,
    status: u16,
    calls: AtomicUsize,
    inner: HashedEmbeddingProvider,
}

impl FlakyProvider {
    pub fn new(failures: usize, status: u16) -> Arc<Self> {
        Arc::new(Self {
            failures,
            status,
            calls: AtomicUsize::new(0),
            inner: HashedEmbeddingProvider::new(DIM),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for FlakyProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ProviderError::Status {
                status: self.status,
                body: "simulated failure".into(),
            });
        }
        self.inner.embed(text)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Sleeps before answering, for timeout tests.
pub struct SlowProvider {
    pub delay: Duration,
}

impl EmbeddingProvider for SlowProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        std::thread::sleep(self.delay);
        Ok(test_embedding(0))
    }

    fn name(&self) -> &str {
        "slow"
    }
}
