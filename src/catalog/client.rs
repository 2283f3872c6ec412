use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::RemoteSource;
use crate::catalog::api_types::{ApiCharacter, ApiEnvelope};
use crate::catalog::types::Character;
use crate::config::RemoteConfig;

/// HTTP client for the character service
#[derive(Clone)]
pub struct HttpCharacterSource {
  client: reqwest::Client,
  endpoint: Url,
  page_size: u32,
  token: Option<String>,
}

impl HttpCharacterSource {
  pub fn new(config: &RemoteConfig, token: Option<String>) -> Result<Self> {
    let endpoint = Self::characters_endpoint(&config.base_url)?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("charpage/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      endpoint,
      page_size: config.page_size,
      token,
    })
  }

  /// `{base_url}/characters`, keeping any path prefix of the base URL
  fn characters_endpoint(base_url: &str) -> Result<Url> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
      base.push('/');
    }

    Url::parse(&base)
      .and_then(|url| url.join("characters"))
      .map_err(|e| eyre!("Invalid base URL '{}': {}", base_url, e))
  }

  /// Get one page of characters starting at `offset`
  pub async fn get_characters(&self, offset: u32) -> Result<Vec<Character>> {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("offset", &offset.to_string())
      .append_pair("limit", &self.page_size.to_string());

    let mut request = self.client.get(url);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach character service: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!(
        "Character service returned {}: {}",
        status,
        body.trim()
      ));
    }

    let envelope: ApiEnvelope<ApiCharacter> = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse character page: {}", e))?;

    let data = envelope.data;
    debug!(
      offset = data.offset,
      limit = data.limit,
      count = data.count,
      total = data.total,
      "Received character page"
    );

    Ok(
      data
        .results
        .into_iter()
        .map(ApiCharacter::into_character)
        .collect(),
    )
  }
}

#[async_trait]
impl RemoteSource<Character> for HttpCharacterSource {
  async fn fetch(&self, offset: u32) -> Result<Vec<Character>> {
    self.get_characters(offset).await
  }
}
