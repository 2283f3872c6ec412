use serde::{Deserialize, Serialize};

/// A catalogue character as shown in list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub description: String,
  /// Full thumbnail URL (path + extension)
  pub thumbnail: Option<String>,
  /// Last modification timestamp as reported by the API
  pub modified: Option<String>,
}
