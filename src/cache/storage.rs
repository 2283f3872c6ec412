//! SQLite implementation of the local store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{Cacheable, LocalStore};

/// Summary of what a store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
  pub items: u64,
  /// When the most recent item was written
  pub last_cached_at: Option<DateTime<Utc>>,
}

/// SQLite-based cache storage implementation.
///
/// Rows are scoped by a namespace (one per remote endpoint) and an entity
/// type. Each row sits at the position it was fetched for, so pages fetched
/// out of order never shift each other. Clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
  namespace: String,
  page_size: u32,
}

impl SqliteStore {
  /// Open (or create) the cache database at `path`, or at the default
  /// location when no path is given.
  pub fn open(path: Option<&Path>, namespace: &str, page_size: u32) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn, namespace, page_size)
  }

  /// Open a throwaway in-memory cache.
  pub fn open_in_memory(namespace: &str, page_size: u32) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn, namespace, page_size)
  }

  fn with_connection(conn: Connection, namespace: &str, page_size: u32) -> Result<Self> {
    if page_size == 0 {
      return Err(eyre!("Page size must be greater than zero"));
    }

    let storage = Self {
      conn: Arc::new(Mutex::new(conn)),
      namespace: namespace.to_string(),
      page_size,
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("charpage").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))
  }

  /// Count cached items of type `T` and report when they were last written.
  pub fn stats<T: Cacheable>(&self) -> Result<CacheStats> {
    let conn = self.lock()?;

    let (items, last): (u64, Option<String>) = conn
      .query_row(
        "SELECT COUNT(*), MAX(cached_at) FROM entity_cache
         WHERE namespace = ? AND entity_type = ?",
        params![self.namespace, T::entity_type()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .map_err(|e| eyre!("Failed to query cache stats: {}", e))?;

    let last_cached_at = last.as_deref().map(parse_datetime).transpose()?;

    Ok(CacheStats {
      items,
      last_cached_at,
    })
  }

  fn read_page<T: Cacheable>(&self, offset: u32) -> Result<Vec<T>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT data FROM entity_cache
         WHERE namespace = ? AND entity_type = ? AND position >= ? AND position < ?
         ORDER BY position",
      )
      .map_err(|e| eyre!("Failed to prepare page query: {}", e))?;

    let start = i64::from(offset);
    let end = start + i64::from(self.page_size);
    let rows = stmt
      .query_map(
        params![self.namespace, T::entity_type(), start, end],
        |row| row.get::<_, Vec<u8>>(0),
      )
      .map_err(|e| eyre!("Failed to query cached page: {}", e))?;

    let mut items = Vec::new();
    for data in rows {
      let data = data.map_err(|e| eyre!("Failed to read cached row: {}", e))?;
      let item =
        serde_json::from_slice(&data).map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
      items.push(item);
    }

    Ok(items)
  }

  fn write<T: Cacheable>(&self, offset: u32, items: &[T], replace: bool) -> Result<()> {
    let mut conn = self.lock()?;
    let entity_type = T::entity_type();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    if replace {
      tx.execute(
        "DELETE FROM entity_cache WHERE namespace = ? AND entity_type = ?",
        params![self.namespace, entity_type],
      )
      .map_err(|e| eyre!("Failed to clear cached entities: {}", e))?;
    }

    // The page takes over its positions
    let start = i64::from(offset);
    tx.execute(
      "DELETE FROM entity_cache
       WHERE namespace = ? AND entity_type = ? AND position >= ? AND position < ?",
      params![self.namespace, entity_type, start, start + items.len() as i64],
    )
    .map_err(|e| eyre!("Failed to clear page positions: {}", e))?;

    self.insert_all(&tx, items, start)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn insert_all<T: Cacheable>(&self, tx: &Transaction<'_>, items: &[T], start: i64) -> Result<()> {
    let mut stmt = tx
      .prepare(
        "INSERT INTO entity_cache (namespace, entity_type, entity_key, position, data, cached_at)
         VALUES (?, ?, ?, ?, ?, datetime('now'))
         ON CONFLICT (namespace, entity_type, entity_key)
         DO UPDATE SET position = excluded.position, data = excluded.data,
                       cached_at = excluded.cached_at",
      )
      .map_err(|e| eyre!("Failed to prepare insert: {}", e))?;

    for (i, item) in items.iter().enumerate() {
      let data =
        serde_json::to_vec(item).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
      // A key cached elsewhere moves here
      stmt
        .execute(params![
          self.namespace,
          T::entity_type(),
          item.cache_key(),
          start + i as i64,
          data
        ])
        .map_err(|e| eyre!("Failed to store entity: {}", e))?;
    }

    Ok(())
  }

  /// Run a blocking database operation off the async worker threads.
  async fn blocking<R, F>(&self, op: F) -> Result<R>
  where
    R: Send + 'static,
    F: FnOnce(&SqliteStore) -> Result<R> + Send + 'static,
  {
    let store = self.clone();
    tokio::task::spawn_blocking(move || op(&store))
      .await
      .map_err(|e| eyre!("Cache task failed: {}", e))?
  }

  /// Whether a key is already cached. Used by tests.
  #[cfg(test)]
  fn contains<T: Cacheable>(&self, key: &str) -> Result<bool> {
    use rusqlite::OptionalExtension;

    let conn = self.lock()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT position FROM entity_cache
         WHERE namespace = ? AND entity_type = ? AND entity_key = ?",
        params![self.namespace, T::entity_type(), key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(found.is_some())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Serialized entities in caller-defined order
CREATE TABLE IF NOT EXISTS entity_cache (
    namespace TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, entity_type, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_entity_cache_position
    ON entity_cache(namespace, entity_type, position);
"#;

#[async_trait]
impl<T: Cacheable> LocalStore<T> for SqliteStore {
  async fn read(&self, offset: u32) -> Result<Vec<T>> {
    self
      .blocking(move |store| store.read_page::<T>(offset))
      .await
  }

  async fn append(&self, offset: u32, items: &[T]) -> Result<()> {
    let items = items.to_vec();
    self
      .blocking(move |store| store.write(offset, &items, false))
      .await
  }

  async fn replace_all(&self, offset: u32, items: &[T]) -> Result<()> {
    let items = items.to_vec();
    self
      .blocking(move |store| store.write(offset, &items, true))
      .await
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Hero {
    id: u32,
    name: String,
  }

  impl Cacheable for Hero {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn entity_type() -> &'static str {
      "hero"
    }
  }

  fn hero(id: u32, name: &str) -> Hero {
    Hero {
      id,
      name: name.to_string(),
    }
  }

  fn names(heroes: &[Hero]) -> Vec<&str> {
    heroes.iter().map(|h| h.name.as_str()).collect()
  }

  #[tokio::test]
  async fn test_read_empty_cache() {
    let store = SqliteStore::open_in_memory("test", 2).unwrap();
    let page: Vec<Hero> = store.read(0).await.unwrap();
    assert!(page.is_empty());
  }

  #[tokio::test]
  async fn test_append_preserves_order_and_pages() {
    let store = SqliteStore::open_in_memory("test", 2).unwrap();
    store
      .append(0, &[hero(3, "Thor"), hero(1, "Hulk")])
      .await
      .unwrap();
    store.append(2, &[hero(2, "Loki")]).await.unwrap();

    let first: Vec<Hero> = store.read(0).await.unwrap();
    let second: Vec<Hero> = store.read(2).await.unwrap();
    let past_end: Vec<Hero> = store.read(4).await.unwrap();

    assert_eq!(names(&first), vec!["Thor", "Hulk"]);
    assert_eq!(names(&second), vec!["Loki"]);
    assert!(past_end.is_empty());
  }

  #[tokio::test]
  async fn test_refetched_page_overwrites_its_positions() {
    let store = SqliteStore::open_in_memory("test", 10).unwrap();
    store
      .append(0, &[hero(1, "Hulk"), hero(2, "Loki")])
      .await
      .unwrap();
    store.append(0, &[hero(1, "Bruce Banner")]).await.unwrap();

    let page: Vec<Hero> = store.read(0).await.unwrap();
    assert_eq!(names(&page), vec!["Bruce Banner", "Loki"]);
  }

  #[tokio::test]
  async fn test_existing_key_moves_to_new_page() {
    let store = SqliteStore::open_in_memory("test", 2).unwrap();
    store
      .append(0, &[hero(1, "Hulk"), hero(2, "Loki")])
      .await
      .unwrap();
    store
      .append(2, &[hero(2, "Loki v2"), hero(3, "Thor")])
      .await
      .unwrap();

    let first: Vec<Hero> = store.read(0).await.unwrap();
    let second: Vec<Hero> = store.read(2).await.unwrap();
    assert_eq!(names(&first), vec!["Hulk"]);
    assert_eq!(names(&second), vec!["Loki v2", "Thor"]);
    assert_eq!(store.stats::<Hero>().unwrap().items, 3);
  }

  #[tokio::test]
  async fn test_non_contiguous_page_keeps_its_offset() {
    let store = SqliteStore::open_in_memory("test", 1).unwrap();
    store.append(40, &[hero(1, "at40")]).await.unwrap();

    let first: Vec<Hero> = store.read(0).await.unwrap();
    let at_forty: Vec<Hero> = store.read(40).await.unwrap();
    assert!(first.is_empty());
    assert_eq!(names(&at_forty), vec!["at40"]);

    store.append(0, &[hero(2, "at0")]).await.unwrap();
    let first: Vec<Hero> = store.read(0).await.unwrap();
    let at_forty: Vec<Hero> = store.read(40).await.unwrap();
    assert_eq!(names(&first), vec!["at0"]);
    assert_eq!(names(&at_forty), vec!["at40"]);
  }

  #[tokio::test]
  async fn test_replace_all_at_offset() {
    let store = SqliteStore::open_in_memory("test", 10).unwrap();
    store.append(0, &[hero(1, "Hulk")]).await.unwrap();
    store.replace_all(20, &[hero(9, "Vision")]).await.unwrap();

    let first: Vec<Hero> = store.read(0).await.unwrap();
    let replaced: Vec<Hero> = store.read(20).await.unwrap();
    assert!(first.is_empty());
    assert_eq!(names(&replaced), vec!["Vision"]);
  }

  #[tokio::test]
  async fn test_read_waits_off_the_runtime_thread() {
    let store = SqliteStore::open_in_memory("test", 10).unwrap();
    let guard = store.lock().unwrap();

    let reader = store.clone();
    let handle = tokio::spawn(async move { LocalStore::<Hero>::read(&reader, 0).await });

    // A read blocking this single-threaded runtime would stall the timer
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!handle.is_finished());

    drop(guard);
    let page = handle.await.unwrap().unwrap();
    assert!(page.is_empty());
  }

  #[tokio::test]
  async fn test_replace_all_discards_previous_items() {
    let store = SqliteStore::open_in_memory("test", 10).unwrap();
    store
      .append(0, &[hero(1, "Hulk"), hero(2, "Loki")])
      .await
      .unwrap();
    store.replace_all(0, &[hero(9, "Vision")]).await.unwrap();

    let page: Vec<Hero> = store.read(0).await.unwrap();
    assert_eq!(names(&page), vec!["Vision"]);
    assert!(!store.contains::<Hero>("1").unwrap());
  }

  #[tokio::test]
  async fn test_namespaces_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let a = SqliteStore::open(Some(&path), "a", 10).unwrap();
    let b = SqliteStore::open(Some(&path), "b", 10).unwrap();
    a.append(0, &[hero(1, "Hulk")]).await.unwrap();
    b.replace_all(0, &[hero(2, "Loki")]).await.unwrap();

    let from_a: Vec<Hero> = a.read(0).await.unwrap();
    assert_eq!(names(&from_a), vec!["Hulk"]);
  }

  #[tokio::test]
  async fn test_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let store = SqliteStore::open(Some(&path), "test", 10).unwrap();
      store.append(0, &[hero(1, "Hulk")]).await.unwrap();
    }

    let store = SqliteStore::open(Some(&path), "test", 10).unwrap();
    let page: Vec<Hero> = store.read(0).await.unwrap();
    assert_eq!(names(&page), vec!["Hulk"]);
  }

  #[tokio::test]
  async fn test_corrupt_row_is_a_read_error() {
    let store = SqliteStore::open_in_memory("test", 10).unwrap();
    store
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO entity_cache (namespace, entity_type, entity_key, position, data)
         VALUES ('test', 'hero', '1', 0, x'00ff')",
        [],
      )
      .unwrap();

    let result: Result<Vec<Hero>> = store.read(0).await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_stats() {
    let store = SqliteStore::open_in_memory("test", 10).unwrap();
    let empty = store.stats::<Hero>().unwrap();
    assert_eq!(empty.items, 0);
    assert!(empty.last_cached_at.is_none());

    store
      .append(0, &[hero(1, "Hulk"), hero(2, "Loki")])
      .await
      .unwrap();
    let stats = store.stats::<Hero>().unwrap();
    assert_eq!(stats.items, 2);
    assert!(stats.last_cached_at.is_some());
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    assert!(SqliteStore::open_in_memory("test", 0).is_err());
  }
}
