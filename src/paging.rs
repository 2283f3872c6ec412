//! Caller-side tracking of which page to request next.

use crate::cache::RequestContext;

/// Tracks the offset of the next page and whether it must bypass the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingTracker {
  offset: u32,
  force_refresh: bool,
}

impl PagingTracker {
  /// Start at `offset`, optionally forcing the first request.
  pub fn starting_at(offset: u32, force_refresh: bool) -> Self {
    Self {
      offset,
      force_refresh,
    }
  }

  /// Restart from the first page and replace whatever is cached.
  pub fn refresh(&mut self) {
    self.offset = 0;
    self.force_refresh = true;
  }

  /// Continue after `total_loaded` items. Follow-up pages are never forced so
  /// they append to the cache instead of replacing it.
  pub fn append_from(&mut self, total_loaded: u32) {
    self.offset = total_loaded;
    self.force_refresh = false;
  }

  /// Continue after a page of `loaded` items fetched at the current offset.
  pub fn advance(&mut self, loaded: usize) {
    let loaded = u32::try_from(loaded).unwrap_or(u32::MAX);
    self.append_from(self.offset.saturating_add(loaded));
  }

  /// The request for the next page.
  pub fn request(&self) -> RequestContext {
    RequestContext {
      offset: self.offset,
      force_refresh: self.force_refresh,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_starts_unforced_at_zero() {
    let tracker = PagingTracker::default();
    assert_eq!(tracker.request(), RequestContext::default());
  }

  #[test]
  fn test_refresh_then_append() {
    let mut tracker = PagingTracker::starting_at(40, false);

    tracker.refresh();
    assert_eq!(
      tracker.request(),
      RequestContext {
        offset: 0,
        force_refresh: true
      }
    );

    tracker.append_from(20);
    assert_eq!(
      tracker.request(),
      RequestContext {
        offset: 20,
        force_refresh: false
      }
    );
  }

  #[test]
  fn test_advance_moves_past_loaded_page() {
    let mut tracker = PagingTracker::default();
    tracker.refresh();
    tracker.advance(20);

    assert_eq!(
      tracker.request(),
      RequestContext {
        offset: 20,
        force_refresh: false
      }
    );
  }

  #[test]
  fn test_advance_saturates_at_max_offset() {
    let mut tracker = PagingTracker::starting_at(u32::MAX - 5, false);
    tracker.advance(20);
    assert_eq!(tracker.request().offset, u32::MAX);
  }
}
