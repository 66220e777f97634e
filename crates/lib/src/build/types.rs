//! Types for the build phase.

use std::path::PathBuf;

use thiserror::Error;

use crate::placeholder::PlaceholderError;

/// Configuration for running build instructions.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
  /// Stream instruction output to the terminal instead of capturing it.
  pub verbose: bool,

  /// Shell used to run instructions; `/bin/sh` when unset.
  pub shell: Option<String>,
}

/// A package ready to be built: its fully substituted instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
  pub name: String,

  /// Working directory for every instruction.
  pub src_path: PathBuf,

  pub instructions: Vec<String>,
}

/// What a completed build did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
  pub packages: usize,
  pub instructions: usize,
}

/// Errors that abort the build phase.
#[derive(Debug, Error)]
pub enum BuildError {
  /// An instruction references a variable that is not defined, or is malformed.
  #[error("package '{package}': cannot resolve instruction #{index} '{instruction}': {source}")]
  Placeholder {
    package: String,
    index: usize,
    instruction: String,
    #[source]
    source: PlaceholderError,
  },

  /// An instruction exited unsuccessfully.
  #[error("package '{package}': instruction #{index} '{instruction}' failed with exit code {code:?}")]
  Failed {
    package: String,
    index: usize,
    instruction: String,
    code: Option<i32>,
  },

  /// The shell could not be started.
  #[error("package '{package}': failed to run instruction '{instruction}': {source}")]
  Spawn {
    package: String,
    instruction: String,
    #[source]
    source: std::io::Error,
  },

  /// The build script could not be written.
  #[error("failed to write build script '{path}': {source}")]
  WriteScript {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The build was cancelled; the running instruction was killed.
  #[error("build cancelled")]
  Cancelled,
}
