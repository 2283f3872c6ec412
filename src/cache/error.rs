use thiserror::Error;

/// Failure emitted by a page request.
///
/// Every variant is recoverable by retrying the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
  #[error("Failed to read local cache: {0}")]
  LocalRead(String),
  #[error("Failed to write local cache: {0}")]
  LocalWrite(String),
  #[error("Failed to fetch from remote source: {0}")]
  RemoteFetch(String),
}

impl FetchError {
  /// Wrap a collaborator report as a local read failure.
  pub fn local_read(report: color_eyre::Report) -> Self {
    Self::LocalRead(format!("{:#}", report))
  }

  pub fn local_write(report: color_eyre::Report) -> Self {
    Self::LocalWrite(format!("{:#}", report))
  }

  pub fn remote_fetch(report: color_eyre::Report) -> Self {
    Self::RemoteFetch(format!("{:#}", report))
  }
}
