//! Manifest loading and validation.
//!
//! A manifest is the `pkg.json` file at the root of a project. Fetched git packages may
//! carry their own `pkg.json`, which is how transitive dependencies are discovered.

mod types;

pub use types::*;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::consts::MANIFEST_FILENAME;

/// Errors that can occur when loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  /// The manifest file does not exist.
  #[error("manifest not found: {0}")]
  NotFound(PathBuf),

  /// Failed to read the manifest file.
  #[error("failed to read manifest '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The manifest is not valid JSON or does not match the schema.
  #[error("failed to parse manifest '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// The manifest parsed but declares something unusable.
  #[error("invalid package '{name}': {reason}")]
  Invalid { name: String, reason: String },
}

impl Manifest {
  /// Load the manifest in `dir`.
  ///
  /// Returns `Ok(None)` if the directory has no `pkg.json`.
  /// Returns `Err` if the file exists but couldn't be read, parsed or validated.
  pub fn load(dir: &Path) -> Result<Option<Self>, ManifestError> {
    let path = dir.join(MANIFEST_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(ManifestError::Read { path, source: e }),
    };

    let manifest: Manifest =
      serde_json::from_str(&content).map_err(|source| ManifestError::Parse { path: path.clone(), source })?;
    manifest.validate()?;

    Ok(Some(manifest))
  }

  /// Load the manifest in `dir`, treating a missing file as an error.
  pub fn load_required(dir: &Path) -> Result<Self, ManifestError> {
    Self::load(dir)?.ok_or_else(|| ManifestError::NotFound(dir.join(MANIFEST_FILENAME)))
  }

  /// Check that every package can be fetched into its own directory.
  ///
  /// - names are non-empty, contain no path separators and are not `.` or `..`
  /// - names are unique across all buckets
  /// - every package has a source URL
  pub fn validate(&self) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();

    for spec in self.packages() {
      let name = spec.name();
      let invalid = |reason: &str| ManifestError::Invalid {
        name: name.to_string(),
        reason: reason.to_string(),
      };

      if name.is_empty() {
        return Err(invalid("package name is empty"));
      }
      if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(invalid("package name must be a single path component"));
      }
      if !seen.insert(name.to_string()) {
        return Err(invalid("package is declared more than once"));
      }

      let url = match &spec {
        PackageSpec::Archive(archive) => &archive.source_url,
        PackageSpec::Files(files) => &files.base_url,
        PackageSpec::Git(git) => &git.repo_url,
      };
      if url.trim().is_empty() {
        return Err(invalid("package has no source path"));
      }

      if let PackageSpec::Git(git) = &spec
        && git.branch.is_some()
        && git.tag.is_some()
      {
        warn!(pkg = name, "both branch and tag are set, the branch is used");
      }
    }

    Ok(())
  }
}
