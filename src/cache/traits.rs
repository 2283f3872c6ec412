//! Core traits and types for the caching system.

use async_trait::async_trait;
use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};

use super::error::FetchError;

/// Trait for entities that can be cached.
///
/// Implementors must provide a unique cache key. The key is used to update an
/// entity in place when the same record is appended twice.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier for this entity (e.g., character id)
  fn cache_key(&self) -> String;

  /// Entity type name for storage organization (e.g., "character")
  fn entity_type() -> &'static str;
}

/// Local cache of items, shared by every page request.
///
/// Items are addressed by position: the item at index `i` of a page fetched
/// at `offset` lives at position `offset + i`. Implementations serialize
/// their own access: `append` and `replace_all` must be atomic with respect
/// to concurrent `read` calls.
#[async_trait]
pub trait LocalStore<T: Cacheable>: Send + Sync + 'static {
  /// Read the page of cached items starting at `offset`.
  /// Returns an empty vec when nothing is cached there.
  async fn read(&self, offset: u32) -> Result<Vec<T>>;

  /// Add the page fetched at `offset` to the cached set, overwriting whatever
  /// occupied those positions. Contiguous pages extend the end of the set.
  async fn append(&self, offset: u32, items: &[T]) -> Result<()>;

  /// Discard every cached item and store the page fetched at `offset`.
  async fn replace_all(&self, offset: u32, items: &[T]) -> Result<()>;
}

/// Remote source of items (network/service boundary).
#[async_trait]
pub trait RemoteSource<T: Cacheable>: Send + Sync + 'static {
  /// Fetch the page of items starting at `offset`.
  async fn fetch(&self, offset: u32) -> Result<Vec<T>>;
}

/// Parameters of a single page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestContext {
  pub offset: u32,
  pub force_refresh: bool,
}

/// Indicates where a page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
  /// Snapshot read from the local cache before any remote fetch
  Cache,
  /// Fresh data from the remote source, already persisted
  Remote,
}

/// An ordered slice of items addressed by an offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub offset: u32,
  pub items: Vec<T>,
  pub source: PageSource,
}

impl<T> Page<T> {
  /// Create a cached snapshot page.
  pub fn from_cache(offset: u32, items: Vec<T>) -> Self {
    Self {
      offset,
      items,
      source: PageSource::Cache,
    }
  }

  /// Create a refreshed page from remote data.
  pub fn from_remote(offset: u32, items: Vec<T>) -> Self {
    Self {
      offset,
      items,
      source: PageSource::Remote,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// One emission of a page request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
  Success(Page<T>),
  Failure(FetchError),
}

impl<T> FetchResult<T> {
  pub fn is_success(&self) -> bool {
    matches!(self, FetchResult::Success(_))
  }

  pub fn page(&self) -> Option<&Page<T>> {
    match self {
      FetchResult::Success(page) => Some(page),
      FetchResult::Failure(_) => None,
    }
  }

  pub fn error(&self) -> Option<&FetchError> {
    match self {
      FetchResult::Success(_) => None,
      FetchResult::Failure(e) => Some(e),
    }
  }
}
