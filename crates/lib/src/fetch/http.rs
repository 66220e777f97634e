//! HTTP transport used by the archive and files fetchers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::FetchError;

/// Downloads a URL into memory.
#[async_trait]
pub trait HttpClient: Send + Sync {
  /// GET `url`, failing on transport errors and on any status >= 400.
  async fn get(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
  client: reqwest::Client,
  timeout: Duration,
}

impl ReqwestClient {
  /// Create a client whose requests are bounded by `timeout`.
  pub fn new(timeout: Duration) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .connect_timeout(timeout.min(Duration::from_secs(30)))
      .user_agent(concat!("pkg/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| FetchError::Client(e.to_string()))?;

    Ok(Self { client, timeout })
  }

  fn request_error(&self, url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
      FetchError::Timeout {
        operation: format!("GET {url}"),
        after: self.timeout,
      }
    } else {
      FetchError::Http {
        url: url.to_string(),
        message: e.to_string(),
      }
    }
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
    debug!(url, "sending request");

    let response = self.client.get(url).send().await.map_err(|e| self.request_error(url, e))?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    let body = response.bytes().await.map_err(|e| self.request_error(url, e))?;
    debug!(url, size = body.len(), "response received");
    Ok(body)
  }
}

/// Join a base URL and a remote suffix with exactly one `/` between them.
pub fn url_join(base: &str, suffix: &str) -> String {
  let base = base.trim_end_matches('/');
  let suffix = suffix.trim_start_matches('/');

  if base.is_empty() {
    suffix.to_string()
  } else if suffix.is_empty() {
    base.to_string()
  } else {
    format!("{base}/{suffix}")
  }
}
