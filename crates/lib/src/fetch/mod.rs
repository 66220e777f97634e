//! Source fetchers.
//!
//! A fetcher materializes a package's source into its destination directory
//! (`vendor/src/<name>`). Three source kinds are supported:
//!
//! - [`archive`]: a zip file downloaded over HTTP and extracted in place
//! - [`files`]: individual files downloaded from a base URL
//! - [`git`]: a repository cloned at a branch, tag or commit, with its `.git` directory removed
//!
//! The transports are injectable capabilities ([`HttpClient`], [`Extractor`], [`GitClient`])
//! so that resolution can be exercised without a network.
//!
//! Fetchers do not check whether the destination already exists; that decision belongs to
//! the resolver, which skips any package whose destination is present.

pub mod archive;
pub mod files;
pub mod git;
pub mod http;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::manifest::PackageSpec;

pub use archive::{Extractor, ZipExtractor};
pub use git::{GitClient, GixClient};
pub use http::{HttpClient, ReqwestClient, url_join};

/// Errors that can occur while fetching a package's source.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Failed to create the destination directory.
  #[error("failed to create directory '{0}': {1}")]
  CreateDir(PathBuf, #[source] io::Error),

  /// Failed to write a downloaded file.
  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A local file name would land outside the destination directory.
  #[error("invalid local path '{path}': {reason}")]
  InvalidPath { path: String, reason: String },

  /// The HTTP client could not be constructed.
  #[error("failed to initialize HTTP client: {0}")]
  Client(String),

  /// The request failed before a response was received.
  #[error("request to {url} failed: {message}")]
  Http { url: String, message: String },

  /// The server answered with a failure status.
  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  /// The downloaded archive could not be extracted.
  #[error("failed to extract '{archive}': {message}")]
  Extract { archive: PathBuf, message: String },

  /// Failed to clone a git repository.
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to open a freshly cloned repository.
  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// The pinned commit does not exist in the repository.
  #[error("revision '{rev}' not found in repository")]
  RevisionNotFound { rev: String },

  /// Failed to check out a revision.
  #[error("failed to checkout revision '{rev}': {source}")]
  Checkout {
    rev: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to remove the version-control metadata of a clone.
  #[error("failed to remove repository metadata '{0}': {1}")]
  RemoveMetadata(PathBuf, #[source] io::Error),

  /// An operation exceeded its time bound.
  #[error("{operation} timed out after {after:?}")]
  Timeout { operation: String, after: Duration },

  /// The fetch was cancelled because another operation failed or the user interrupted.
  #[error("fetch cancelled")]
  Cancelled,

  /// A background task panicked or was aborted.
  #[error("background task failed: {0}")]
  Task(String),
}

impl FetchError {
  /// Whether retrying the same fetch might succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      FetchError::Http { .. } | FetchError::Timeout { .. } | FetchError::Clone { .. } => true,
      FetchError::Status { status, .. } => *status >= 500 || *status == 429,
      _ => false,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, FetchError::Cancelled)
  }
}

/// Time bounds for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchConfig {
  /// Upper bound for a single HTTP request, body included.
  pub http_timeout: Duration,

  /// Upper bound for a single git clone or checkout.
  pub git_timeout: Duration,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      http_timeout: Duration::from_secs(120),
      git_timeout: Duration::from_secs(600),
    }
  }
}

/// Fetches packages of every source kind into their destinations.
#[derive(Clone)]
pub struct Fetcher {
  http: Arc<dyn HttpClient>,
  extractor: Arc<dyn Extractor>,
  git: Arc<dyn GitClient>,
  credentials: Credentials,
  config: FetchConfig,
}

impl std::fmt::Debug for Fetcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Fetcher")
      .field("credentials", &self.credentials)
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl Fetcher {
  /// Create a fetcher using the network-backed capabilities.
  pub fn new(config: FetchConfig, credentials: Credentials) -> Result<Self, FetchError> {
    let http = ReqwestClient::new(config.http_timeout)?;
    Ok(Self {
      http: Arc::new(http),
      extractor: Arc::new(ZipExtractor),
      git: Arc::new(GixClient),
      credentials,
      config,
    })
  }

  pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
    self.http = http;
    self
  }

  pub fn with_git(mut self, git: Arc<dyn GitClient>) -> Self {
    self.git = git;
    self
  }

  /// Fetch `spec` into `dest`.
  ///
  /// On failure, whatever was already written stays on disk.
  pub async fn fetch(&self, spec: &PackageSpec, dest: &Path, cancel: &CancellationToken) -> Result<(), FetchError> {
    debug!(pkg = spec.name(), kind = spec.kind(), storage = %dest.display(), "fetching package");

    match spec {
      PackageSpec::Archive(archive) => {
        archive::fetch_archive(self.http.as_ref(), self.extractor.clone(), archive, dest, cancel).await
      }
      PackageSpec::Files(files) => files::fetch_files(self.http.as_ref(), files, dest, cancel).await,
      PackageSpec::Git(repo) => {
        git::fetch_git(
          self.git.clone(),
          &self.credentials,
          repo,
          dest,
          self.config.git_timeout,
          cancel,
        )
        .await
      }
    }
  }
}

/// Create `dir` and its parents.
pub(crate) async fn create_dir(dir: &Path) -> Result<(), FetchError> {
  tokio::fs::create_dir_all(dir)
    .await
    .map_err(|e| FetchError::CreateDir(dir.to_path_buf(), e))
}

/// Run `future` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
  cancel: &CancellationToken,
  future: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(FetchError::Cancelled),
    result = future => result,
  }
}

/// How long an interrupted blocking operation gets to stop before its caller moves on.
pub const INTERRUPT_GRACE: Duration = Duration::from_secs(1);

/// Run a blocking operation on the blocking pool, bounded by `timeout` and `cancel`.
///
/// The closure receives an interrupt flag that is raised when the bound is hit. The caller
/// then waits up to [`INTERRUPT_GRACE`] for the operation to stop, so that in the usual case
/// nothing is still writing to the destination once this returns.
pub(crate) async fn run_blocking<T, F>(
  operation: &str,
  timeout: Duration,
  cancel: &CancellationToken,
  f: F,
) -> Result<T, FetchError>
where
  T: Send + 'static,
  F: FnOnce(&AtomicBool) -> Result<T, FetchError> + Send + 'static,
{
  let interrupt = Arc::new(AtomicBool::new(false));
  let flag = interrupt.clone();
  let mut handle = tokio::task::spawn_blocking(move || f(&flag));

  let err = tokio::select! {
    joined = &mut handle => return joined.map_err(|e| FetchError::Task(e.to_string()))?,
    _ = tokio::time::sleep(timeout) => FetchError::Timeout {
      operation: operation.to_string(),
      after: timeout,
    },
    _ = cancel.cancelled() => FetchError::Cancelled,
  };

  interrupt.store(true, Ordering::Relaxed);
  if tokio::time::timeout(INTERRUPT_GRACE, &mut handle).await.is_err() {
    warn!(operation, grace = ?INTERRUPT_GRACE, "interrupted operation is still running");
  }

  Err(err)
}
