//! Offline feature-hashing embedder.
//!
//! Lowercased alphanumeric words and their character trigrams are hashed with
//! FNV-1a into a fixed number of signed buckets, then L2-normalised. Texts that
//! share words score high; paraphrases with different words do not. Good enough
//! for tests, demos and machines without network access.

use super::{l2_normalize, EmbeddingProvider};
use crate::error::ProviderError;

/// Character trigrams count for less than whole words.
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashedEmbeddingProvider {
    dimensions: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a_hash(feature);
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashedEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dimensions];
        let mut features = 0usize;

        for raw in text.split(|c: char| !c.is_alphanumeric()) {
            if raw.is_empty() {
                continue;
            }
            let word = raw.to_lowercase();
            self.add_feature(&mut vector, word.as_bytes(), 1.0);
            features += 1;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        if features == 0 {
            return Err(ProviderError::InvalidResponse(
                "text has no words to embed".into(),
            ));
        }
        l2_normalize(&mut vector);
        if vector.iter().all(|x| *x == 0.0) {
            // every feature cancelled out; fall back to a single marker bucket
            vector[0] = 1.0;
        }
        Ok(vector)
    }

    fn name(&self) -> &str {
        "hashed"
    }
}

fn fnv1a_hash(bytes: &[u8]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
