//! Caching implementations for catalogue types.

use sha2::{Digest, Sha256};

use crate::cache::Cacheable;

use super::types::Character;

impl Cacheable for Character {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "character"
  }
}

/// Cache namespace for a remote endpoint.
///
/// Rows fetched from different backends never mix. The URL is normalized so
/// trailing slashes and case do not split the cache.
pub fn namespace_for(base_url: &str) -> String {
  let normalized = base_url.trim().trim_end_matches('/').to_lowercase();

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  hex::encode(hasher.finalize())
}
