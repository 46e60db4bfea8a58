pub mod backup;
pub mod export;
pub mod maintenance;
pub mod remember;
pub mod search;
pub mod stats;

use std::sync::Arc;

use anyhow::{Context, Result};

use mnemo::config::MnemoConfig;
use mnemo::embedding::{self, EmbeddingProvider};
use mnemo::error::ProviderError;
use mnemo::MemoryStore;

/// Stand-in for commands that never embed, so a missing API key does not
/// block `stats`, `forget` or `export`.
struct Unconfigured(String);

impl EmbeddingProvider for Unconfigured {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Unavailable(self.0.clone()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Open the store in the configured data directory.
pub fn open_store(config: &MnemoConfig, needs_embedding: bool) -> Result<MemoryStore> {
    let provider: Arc<dyn EmbeddingProvider> = match embedding::create_provider(&config.embedding) {
        Ok(provider) => Arc::from(provider),
        Err(e) if !needs_embedding => {
            tracing::debug!(error = %e, "embedding provider unavailable, continuing without it");
            Arc::new(Unconfigured(e.to_string()))
        }
        Err(e) => return Err(e).context("failed to create embedding provider"),
    };
    MemoryStore::open(config, provider).with_context(|| {
        format!(
            "failed to open memory store at {} (see `mnemo backups` / `mnemo restore`)",
            config.resolved_data_dir().display()
        )
    })
}
