//! Bounded, deduplicated semantic memory for personal assistants.
//!
//! mnemo keeps a collection of natural-language memories, each with a vector
//! embedding, and answers "what do I know that is relevant to this?" by cosine
//! similarity. Three policies keep the collection small and useful:
//!
//! | Policy | Effect |
//! |--------|--------|
//! | **Dedup** | A new memory scoring ≥ 0.9 against an existing one is merged into it |
//! | **Decay** | Retention score combines importance, recency of access, and access frequency |
//! | **Eviction** | Above capacity (default 500), the lowest-scoring memory goes first |
//!
//! # Architecture
//!
//! - **Storage**: one `ndarray` matrix of embeddings plus a parallel metadata
//!   ledger, snapshotted to `vectors.bin` + `memories.json` with rotated backups
//! - **Embeddings**: any OpenAI-compatible `/embeddings` endpoint, or an offline
//!   feature-hashing embedder
//! - **Search**: exact linear cosine scan
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`embedding`]: Embedding provider trait and implementations
//! - [`error`]: Error kinds
//! - [`memory`]: Core memory engine and the [`memory::store::MemoryStore`] handle
//! - [`snapshot`]: Snapshot persistence and backups

pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod snapshot;

pub use config::MnemoConfig;
pub use error::{MemoryError, ProviderError};
pub use memory::store::MemoryStore;
pub use memory::types::{Importance, MemoryRecord, RecallMatch, RememberOutcome};
