//! Generic caching layer for paged data with a "fetch newer if needed" policy.
//!
//! This module is domain-agnostic. It provides:
//! - `LocalStore` / `RemoteSource` seams and their result types
//! - A pure decision policy for when the remote source must be queried
//! - `DataOrchestrator`, which serves a cached snapshot first and then, when
//!   needed, a refreshed snapshot persisted by append or full replace
//! - SQLite and in-memory local stores

mod error;
mod layer;
mod memory;
mod policy;
mod storage;
mod traits;

pub use error::FetchError;
pub use layer::{DataOrchestrator, PageStream};
pub use memory::MemoryStore;
pub use policy::should_fetch;
pub use storage::{CacheStats, SqliteStore};
pub use traits::{
  Cacheable, FetchResult, LocalStore, Page, PageSource, RemoteSource, RequestContext,
};
