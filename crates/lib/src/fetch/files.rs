//! Files fetcher: downloads individually listed files from a base URL.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use super::http::{HttpClient, url_join};
use super::{FetchError, cancellable, create_dir};
use crate::manifest::FilesSpec;

/// Download every file of `spec` into `dest`, in declared order.
///
/// Stops at the first failure; files downloaded before it stay on disk.
pub(crate) async fn fetch_files(
  http: &dyn HttpClient,
  spec: &FilesSpec,
  dest: &Path,
  cancel: &tokio_util::sync::CancellationToken,
) -> Result<(), FetchError> {
  create_dir(dest).await?;

  for (remote, local) in &spec.files {
    let target = local_target(dest, local)?;
    let url = url_join(&spec.base_url, remote);

    info!(pkg = %spec.name, storage = %target.display(), "downloading file");

    let body = cancellable(cancel, http.get(&url)).await?;

    if let Some(parent) = target.parent() {
      create_dir(parent).await?;
    }
    tokio::fs::write(&target, &body)
      .await
      .map_err(|e| FetchError::Write {
        path: target.clone(),
        source: e,
      })?;

    debug!(pkg = %spec.name, url, size = body.len(), "downloaded file");
  }

  info!(pkg = %spec.name, files = spec.files.len(), "downloaded package files");
  Ok(())
}

/// Resolve a manifest-provided local file name inside `dest`.
///
/// Names may contain sub-directories but must stay inside the package directory.
fn local_target(dest: &Path, local: &str) -> Result<PathBuf, FetchError> {
  let relative = Path::new(local);
  let invalid = |reason: &str| FetchError::InvalidPath {
    path: local.to_string(),
    reason: reason.to_string(),
  };

  if local.is_empty() {
    return Err(invalid("file name is empty"));
  }
  if !relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
    return Err(invalid("file name must be relative and stay inside the package directory"));
  }

  Ok(dest.join(relative))
}
