//! Serde-deserializable types matching the character service responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::types::Character;

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub data: ApiDataContainer<T>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDataContainer<T> {
  #[serde(default)]
  pub offset: u32,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub total: u32,
  #[serde(default)]
  pub count: u32,
  #[serde(default = "Vec::new")]
  pub results: Vec<T>,
}

// ============================================================================
// Character records
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiImage {
  pub path: String,
  pub extension: String,
}

impl ApiImage {
  fn url(&self) -> String {
    format!("{}.{}", self.path, self.extension)
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiCharacter {
  pub id: u64,
  pub name: String,
  // Frequently null or empty
  pub description: Option<String>,
  pub thumbnail: Option<ApiImage>,
  pub modified: Option<String>,
}

impl ApiCharacter {
  pub fn into_character(self) -> Character {
    Character {
      id: self.id,
      name: self.name,
      description: self.description.unwrap_or_default(),
      thumbnail: self.thumbnail.as_ref().map(ApiImage::url),
      modified: self.modified,
    }
  }
}
