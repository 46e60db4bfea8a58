//! Core memory engine: vector store, metadata ledger, search, dedup, retention,
//! maintenance, and the [`store::MemoryStore`] handle that ties them together.

pub mod context;
pub mod dedup;
pub mod index;
pub mod maintenance;
pub mod retention;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;
pub mod vectors;
