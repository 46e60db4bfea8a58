//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and two implementations: an
//! OpenAI-compatible HTTP client and an offline feature-hashing embedder. The
//! provider is created via [`create_provider`] from configuration.

pub mod hashed;
pub mod openai;

use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

/// Trait for embedding text into vectors.
///
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`, which is what `MemoryStore` does.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Supported: `"openai"` (any OpenAI-compatible `/embeddings` endpoint) and
/// `"hashed"` (deterministic, no network).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>, ProviderError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiEmbeddingProvider::from_config(config)?)),
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new(config.dimensions))),
        other => Err(ProviderError::Unavailable(format!(
            "unknown embedding provider: {other}. Supported: openai, hashed"
        ))),
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
