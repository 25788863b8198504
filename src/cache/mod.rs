//! Persisted snapshots of query results.
//!
//! The in-memory list lives in `PatternStore`; this module only keeps the
//! last known result on disk so the next start has something to show
//! before (or without) the network:
//! - Entities are stored as JSON keyed by `Cacheable::cache_key`
//! - Query results keep entity order
//! - `NoopStorage` turns persistence off

mod storage;
mod traits;

pub use storage::{CacheStorage, NoopStorage, SqliteStorage, StorageBackend};
pub use traits::{CacheSource, Cacheable, QueryKey};
