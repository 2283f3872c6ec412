//! Orchestration of the local cache and the remote source for paged reads.

use futures::Stream;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::FetchError;
use super::policy::should_fetch;
use super::traits::{Cacheable, FetchResult, LocalStore, Page, RemoteSource, RequestContext};

/// A page request never yields more than a cached and a refreshed snapshot.
const MAX_EMISSIONS: usize = 2;

/// Serves pages cache-first and fetches newer data only when needed.
///
/// Each call to [`DataOrchestrator::fetch_page`] runs on its own task and
/// reports through a [`PageStream`]. The orchestrator itself holds no mutable
/// state; the local store is the only resource shared between requests.
pub struct DataOrchestrator<T, L, R> {
  local: Arc<L>,
  remote: Arc<R>,
  _item: PhantomData<fn() -> T>,
}

impl<T, L, R> DataOrchestrator<T, L, R>
where
  T: Cacheable,
  L: LocalStore<T>,
  R: RemoteSource<T>,
{
  /// Create a new orchestrator over the given collaborators.
  pub fn new(local: L, remote: R) -> Self {
    Self::from_shared(Arc::new(local), Arc::new(remote))
  }

  /// Create an orchestrator over collaborators that are also used elsewhere.
  pub fn from_shared(local: Arc<L>, remote: Arc<R>) -> Self {
    Self {
      local,
      remote,
      _item: PhantomData,
    }
  }

  /// Request the page at `offset`.
  ///
  /// The returned stream yields the cached snapshot first (possibly empty),
  /// then, if the cache was empty or `force_refresh` is set, either the
  /// refreshed snapshot or the failure that stopped it. A failed local read
  /// yields a single failure and skips the remote source entirely.
  ///
  /// Must be called from within a tokio runtime.
  pub fn fetch_page(&self, offset: u32, force_refresh: bool) -> PageStream<T> {
    self.fetch(RequestContext {
      offset,
      force_refresh,
    })
  }

  /// Same as [`fetch_page`](Self::fetch_page) with a prepared request.
  pub fn fetch(&self, request: RequestContext) -> PageStream<T> {
    let (tx, rx) = mpsc::channel(MAX_EMISSIONS);
    let local = Arc::clone(&self.local);
    let remote = Arc::clone(&self.remote);

    tokio::spawn(run_request(local, remote, request, tx));

    PageStream { rx }
  }
}

impl<T, L, R> Clone for DataOrchestrator<T, L, R> {
  fn clone(&self) -> Self {
    Self {
      local: Arc::clone(&self.local),
      remote: Arc::clone(&self.remote),
      _item: PhantomData,
    }
  }
}

async fn run_request<T, L, R>(
  local: Arc<L>,
  remote: Arc<R>,
  request: RequestContext,
  tx: mpsc::Sender<FetchResult<T>>,
) where
  T: Cacheable,
  L: LocalStore<T>,
  R: RemoteSource<T>,
{
  let RequestContext {
    offset,
    force_refresh,
  } = request;

  let cached = match local.read(offset).await {
    Ok(items) => items,
    Err(e) => {
      warn!(offset, error = %e, "Local cache read failed");
      let _ = tx
        .send(FetchResult::Failure(FetchError::local_read(e)))
        .await;
      return;
    }
  };

  let fetch_required = should_fetch(Some(cached.as_slice()), force_refresh);
  debug!(
    offset,
    cached = cached.len(),
    force_refresh,
    fetch_required,
    "Read cached page"
  );

  if tx
    .send(FetchResult::Success(Page::from_cache(offset, cached)))
    .await
    .is_err()
  {
    debug!(offset, "Page request abandoned after cache read");
    return;
  }

  if !fetch_required {
    return;
  }

  // Dropping the fetch future when the consumer goes away releases the
  // underlying connection.
  let fetched = tokio::select! {
    _ = tx.closed() => {
      debug!(offset, "Page request abandoned during remote fetch");
      return;
    }
    result = remote.fetch(offset) => result,
  };

  let result = match fetched {
    Ok(items) => {
      info!(offset, count = items.len(), force_refresh, "Fetched page from remote");
      let persisted = if force_refresh {
        local.replace_all(offset, &items).await
      } else {
        local.append(offset, &items).await
      };
      match persisted {
        Ok(()) => FetchResult::Success(Page::from_remote(offset, items)),
        Err(e) => {
          warn!(offset, error = %e, "Failed to persist fetched page");
          FetchResult::Failure(FetchError::local_write(e))
        }
      }
    }
    Err(e) => {
      warn!(offset, error = %e, "Remote fetch failed");
      FetchResult::Failure(FetchError::remote_fetch(e))
    }
  };

  // Receiver may have been dropped
  let _ = tx.send(result).await;
}

/// Finite stream of results for one page request.
///
/// Dropping it cancels a remote fetch that is still in flight.
#[derive(Debug)]
pub struct PageStream<T> {
  rx: mpsc::Receiver<FetchResult<T>>,
}

impl<T> PageStream<T> {
  /// Wait for the next result. Returns `None` once the request is finished.
  pub async fn next_result(&mut self) -> Option<FetchResult<T>> {
    self.rx.recv().await
  }

  /// Drain every remaining result.
  pub async fn collect_all(mut self) -> Vec<FetchResult<T>> {
    let mut results = Vec::with_capacity(MAX_EMISSIONS);
    while let Some(result) = self.rx.recv().await {
      results.push(result);
    }
    results
  }
}

impl<T> Stream for PageStream<T> {
  type Item = FetchResult<T>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.rx.poll_recv(cx)
  }
}
