//! Decision of whether a page request must hit the remote source.

/// Returns true when the remote source must be queried.
///
/// A forced refresh always fetches. Otherwise only a cache that is known to be
/// empty triggers a fetch. `None` means emptiness could not be determined and
/// counts as not empty, leaving the decision to `force_refresh` alone.
pub fn should_fetch<T>(cached: Option<&[T]>, force_refresh: bool) -> bool {
  force_refresh || cached.map(|items| items.is_empty()).unwrap_or(false)
}
