//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for entities that can be cached.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g., pattern id)
  fn cache_key(&self) -> String;

  /// Entity type name for storage organization (e.g., "proxy_pattern")
  fn entity_type() -> &'static str;
}

/// Identifies one cached query result.
pub trait QueryKey {
  /// Stable, fixed-length key used as the storage primary key
  fn cache_hash(&self) -> String;

  /// Human readable form, stored alongside for debugging
  fn description(&self) -> String;
}

/// Indicates where the data currently shown came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the network during this session
  Network,
  /// Loaded from the on-disk snapshot, not yet confirmed by the server
  Snapshot,
  /// Snapshot kept on screen because the network fetch failed
  Offline,
}
