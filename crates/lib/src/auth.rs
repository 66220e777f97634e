//! Git credentials.
//!
//! Private repositories are reached by embedding a username and token into the clone URL.
//! Credentials are read from `auth.json` in the configuration directory:
//!
//! ```json
//! [
//!   { "host": "git.example.com", "username": "ci", "token": "glpat-..." }
//! ]
//! ```
//!
//! An entry applies when its `host` equals the `host[:port]` of the repository URL exactly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Credentials for a single git host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
  pub host: String,
  pub username: String,
  pub token: String,
}

impl std::fmt::Debug for Credential {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credential")
      .field("host", &self.host)
      .field("username", &self.username)
      .field("token", &"<redacted>")
      .finish()
  }
}

/// An ordered list of credentials; the first matching host wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Vec<Credential>);

#[derive(Debug, Error)]
pub enum AuthError {
  #[error("failed to read credentials file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse credentials file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

impl Credentials {
  pub fn new(entries: Vec<Credential>) -> Self {
    Self(entries)
  }

  /// Load credentials from the given file.
  ///
  /// A missing file yields an empty credential list.
  pub fn load(path: &Path) -> Result<Self, AuthError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(e) => {
        return Err(AuthError::Read {
          path: path.to_path_buf(),
          source: e,
        });
      }
    };

    serde_json::from_str(&content).map_err(|source| AuthError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Find the credential registered for `host`.
  pub fn for_host(&self, host: &str) -> Option<&Credential> {
    self.0.iter().find(|c| c.host == host)
  }

  /// Rewrite `url` to carry the credentials registered for its host.
  ///
  /// URLs without a matching entry, and URLs that are not absolute URLs
  /// (e.g. scp-style `git@host:org/repo.git`), are returned unchanged.
  pub fn authenticate(&self, url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
      debug!(url, "repository path is not a URL, no credentials applied");
      return url.to_string();
    };

    let Some(credential) = url_host(&parsed).and_then(|host| self.for_host(&host)) else {
      return url.to_string();
    };

    if parsed.set_username(&credential.username).is_err() || parsed.set_password(Some(&credential.token)).is_err() {
      debug!(url, "repository URL cannot carry credentials");
      return url.to_string();
    }

    debug!(host = %credential.host, "applied repository credentials");
    parsed.to_string()
  }
}

/// The `host[:port]` of `url`, as credentials entries are keyed.
fn url_host(url: &Url) -> Option<String> {
  let host = url.host_str()?;
  Some(match url.port() {
    Some(port) => format!("{host}:{port}"),
    None => host.to_string(),
  })
}

/// Strip any password or token from `url` so it can be logged or shown in errors.
pub fn redact(url: &str) -> String {
  match Url::parse(url) {
    Ok(mut parsed) if parsed.password().is_some() => {
      if parsed.set_password(None).is_err() {
        return "<redacted>".to_string();
      }
      parsed.to_string()
    }
    _ => url.to_string(),
  }
}
