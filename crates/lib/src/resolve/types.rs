//! Types for dependency resolution.
//!
//! This module defines the configuration and error types of the resolver.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::fetch::FetchError;
use crate::manifest::ManifestError;

/// Configuration for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
  /// Maximum number of fetches running at the same time (minimum 1).
  pub jobs: usize,

  /// How many times a transient fetch failure is retried.
  pub retries: u32,

  /// Pause between retries.
  pub retry_delay: Duration,

  /// Remove the destination of a package whose fetch failed.
  pub clean_failed: bool,
}

impl Default for ResolveConfig {
  fn default() -> Self {
    Self {
      jobs: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
      retries: 0,
      retry_delay: Duration::from_secs(1),
      clean_failed: false,
    }
  }
}

/// Errors that abort a resolution run.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A package's source could not be fetched.
  #[error("failed to fetch package '{name}': {source}")]
  Fetch {
    name: String,
    #[source]
    source: FetchError,
  },

  /// A fetched package ships a manifest that cannot be used.
  #[error("invalid manifest in package '{package}': {source}")]
  Manifest {
    package: String,
    #[source]
    source: ManifestError,
  },

  /// The manifest being resolved is invalid.
  #[error("invalid manifest: {source}")]
  InvalidManifest {
    #[source]
    source: ManifestError,
  },

  /// A package depends on itself through its own dependencies.
  #[error("dependency cycle detected: {chain}")]
  Cycle { chain: String },

  /// A partially fetched destination could not be removed.
  #[error("failed to clean up '{path}': {source}")]
  Cleanup {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Resolution was cancelled before it finished.
  #[error("resolution cancelled")]
  Cancelled,

  /// A resolution task panicked.
  #[error("resolution task failed: {0}")]
  Task(String),
}

impl ResolveError {
  /// Whether this error only reports that the run was cancelled.
  pub fn is_cancelled(&self) -> bool {
    match self {
      ResolveError::Cancelled => true,
      ResolveError::Fetch { source, .. } => source.is_cancelled(),
      _ => false,
    }
  }
}
