//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::traits::{Cacheable, QueryKey};

/// Result of a cached query lookup.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// When the query result was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Replace the stored result of a query, keeping entity order.
  fn store_query_result<T: Cacheable, K: QueryKey>(&self, key: &K, entities: &[T]) -> Result<()>;

  /// Get cached entities for a query.
  fn get_query_result<T: Cacheable, K: QueryKey>(
    &self,
    key: &K,
  ) -> Result<Option<CachedQueryResult<T>>>;

  /// Forget a query result.
  fn clear_query<K: QueryKey>(&self, key: &K) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store_query_result<T: Cacheable, K: QueryKey>(
    &self,
    _key: &K,
    _entities: &[T],
  ) -> Result<()> {
    Ok(()) // Discard
  }

  fn get_query_result<T: Cacheable, K: QueryKey>(
    &self,
    _key: &K,
  ) -> Result<Option<CachedQueryResult<T>>> {
    Ok(None) // Always miss
  }

  fn clear_query<K: QueryKey>(&self, _key: &K) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Throwaway database for tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pxp").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Generic entity cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, entity_key)
);

-- Query result tracking
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    result_count INTEGER NOT NULL
);

-- Query to entity mapping (preserves order)
CREATE TABLE IF NOT EXISTS query_results (
    query_hash TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_query_results_hash ON query_results(query_hash);
"#;

impl CacheStorage for SqliteStorage {
  fn store_query_result<T: Cacheable, K: QueryKey>(&self, key: &K, entities: &[T]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();
    let query_hash = key.cache_hash();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM query_results WHERE query_hash = ?",
      params![query_hash],
    )
    .map_err(|e| eyre!("Failed to delete old query results: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO query_cache (query_hash, query_description, entity_type, cached_at, result_count)
       VALUES (?, ?, ?, datetime('now'), ?)",
      params![query_hash, key.description(), entity_type, entities.len()],
    )
    .map_err(|e| eyre!("Failed to update query cache: {}", e))?;

    for (position, entity) in entities.iter().enumerate() {
      let entity_key = entity.cache_key();
      let data =
        serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![entity_type, entity_key, data],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO query_results (query_hash, entity_key, position)
         VALUES (?, ?, ?)",
        params![query_hash, entity_key, position],
      )
      .map_err(|e| eyre!("Failed to store query result: {}", e))?;
    }

    // Entities no query references anymore (deleted patterns)
    tx.execute(
      "DELETE FROM entity_cache WHERE entity_type = ?1 AND entity_key NOT IN (
         SELECT qr.entity_key FROM query_results qr
         INNER JOIN query_cache qc ON qc.query_hash = qr.query_hash
         WHERE qc.entity_type = ?1
       )",
      params![entity_type],
    )
    .map_err(|e| eyre!("Failed to prune entity cache: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    debug!(
      query = %key.description(),
      count = entities.len(),
      "stored query snapshot"
    );
    Ok(())
  }

  fn get_query_result<T: Cacheable, K: QueryKey>(
    &self,
    key: &K,
  ) -> Result<Option<CachedQueryResult<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();
    let query_hash = key.cache_hash();

    let cached_at_str: Option<String> = conn
      .query_row(
        "SELECT cached_at FROM query_cache
         WHERE query_hash = ? AND entity_type = ?",
        params![query_hash, entity_type],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read query cache: {}", e))?;

    let cached_at = match cached_at_str {
      Some(s) => parse_datetime(&s)?,
      None => return Ok(None),
    };

    let mut stmt = conn
      .prepare(
        "SELECT ec.data FROM entity_cache ec
         INNER JOIN query_results qr ON ec.entity_type = ? AND ec.entity_key = qr.entity_key
         WHERE qr.query_hash = ?
         ORDER BY qr.position",
      )
      .map_err(|e| eyre!("Failed to prepare entity query: {}", e))?;

    let entities: Vec<T> = stmt
      .query_map(params![entity_type, query_hash], |row| {
        let data: Vec<u8> = row.get(0)?;
        Ok(data)
      })
      .map_err(|e| eyre!("Failed to query entities: {}", e))?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(Some(CachedQueryResult {
      entities,
      cached_at,
    }))
  }

  fn clear_query<K: QueryKey>(&self, key: &K) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let query_hash = key.cache_hash();

    conn
      .execute(
        "DELETE FROM query_results WHERE query_hash = ?",
        params![query_hash],
      )
      .map_err(|e| eyre!("Failed to clear query results: {}", e))?;
    conn
      .execute(
        "DELETE FROM query_cache WHERE query_hash = ?",
        params![query_hash],
      )
      .map_err(|e| eyre!("Failed to clear query cache: {}", e))?;

    Ok(())
  }
}

/// Storage backend chosen at startup.
pub enum StorageBackend {
  Sqlite(SqliteStorage),
  Noop(NoopStorage),
}

impl CacheStorage for StorageBackend {
  fn store_query_result<T: Cacheable, K: QueryKey>(&self, key: &K, entities: &[T]) -> Result<()> {
    match self {
      StorageBackend::Sqlite(s) => s.store_query_result(key, entities),
      StorageBackend::Noop(s) => s.store_query_result(key, entities),
    }
  }

  fn get_query_result<T: Cacheable, K: QueryKey>(
    &self,
    key: &K,
  ) -> Result<Option<CachedQueryResult<T>>> {
    match self {
      StorageBackend::Sqlite(s) => s.get_query_result(key),
      StorageBackend::Noop(s) => s.get_query_result(key),
    }
  }

  fn clear_query<K: QueryKey>(&self, key: &K) -> Result<()> {
    match self {
      StorageBackend::Sqlite(s) => s.clear_query(key),
      StorageBackend::Noop(s) => s.clear_query(key),
    }
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
