//! Archive fetcher: downloads a zip file and extracts it into the package directory.
//!
//! The archive is saved as `<dest>/<name>.zip` before extraction and deleted once
//! extraction succeeded. A failed extraction leaves it on disk for inspection.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zip::ZipArchive;

use super::http::HttpClient;
use super::{FetchError, cancellable, create_dir};
use crate::manifest::ArchiveSpec;

/// Unpacks a downloaded archive into a directory.
pub trait Extractor: Send + Sync {
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), FetchError>;
}

/// [`Extractor`] for zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
  fn extract(&self, archive_path: &Path, dest: &Path) -> Result<(), FetchError> {
    let extract_err = |message: String| FetchError::Extract {
      archive: archive_path.to_path_buf(),
      message,
    };

    let file = File::open(archive_path).map_err(|e| extract_err(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| extract_err(e.to_string()))?;

    for i in 0..archive.len() {
      let mut entry = archive.by_index(i).map_err(|e| extract_err(e.to_string()))?;
      // Entries escaping the destination (absolute paths, `..`) are skipped.
      let Some(relative_path) = entry.enclosed_name() else {
        debug!(entry = entry.name(), "skipping unsafe archive entry");
        continue;
      };
      let target = dest.join(relative_path);

      if entry.is_dir() {
        fs::create_dir_all(&target).map_err(|e| extract_err(e.to_string()))?;
        continue;
      }

      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| extract_err(e.to_string()))?;
      }
      let mut outfile = File::create(&target).map_err(|e| extract_err(e.to_string()))?;
      io::copy(&mut entry, &mut outfile).map_err(|e| extract_err(e.to_string()))?;
      restore_mode(&target, entry.unix_mode()).map_err(|e| extract_err(e.to_string()))?;
    }

    Ok(())
  }
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  match mode {
    Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
    None => Ok(()),
  }
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
  Ok(())
}

/// Download `spec`'s archive into `dest` and extract it there.
pub(crate) async fn fetch_archive(
  http: &dyn HttpClient,
  extractor: Arc<dyn Extractor>,
  spec: &ArchiveSpec,
  dest: &Path,
  cancel: &CancellationToken,
) -> Result<(), FetchError> {
  create_dir(dest).await?;

  info!(pkg = %spec.name, storage = %dest.display(), "downloading package archive");
  let body = cancellable(cancel, http.get(&spec.source_url)).await?;

  let zip_path = dest.join(format!("{}.zip", spec.name));
  tokio::fs::write(&zip_path, &body)
    .await
    .map_err(|e| FetchError::Write {
      path: zip_path.clone(),
      source: e,
    })?;
  info!(pkg = %spec.name, size = body.len(), "downloaded package archive");

  info!(pkg = %spec.name, archive = %zip_path.display(), "extracting package");
  let (archive, target) = (zip_path.clone(), dest.to_path_buf());
  tokio::task::spawn_blocking(move || extractor.extract(&archive, &target))
    .await
    .map_err(|e| FetchError::Task(e.to_string()))??;

  tokio::fs::remove_file(&zip_path)
    .await
    .map_err(|e| FetchError::Write {
      path: zip_path.clone(),
      source: e,
    })?;
  info!(pkg = %spec.name, storage = %dest.display(), "finished extracting package");

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::ReqwestClient;
  use crate::manifest::BuildRecipe;
  use crate::util::testutil::zip_bytes;
  use mockito::Server;
  use std::time::Duration;
  use tempfile::TempDir;

  fn spec(url: String) -> ArchiveSpec {
    ArchiveSpec {
      name: "zlib".to_string(),
      source_url: url,
      build: BuildRecipe::default(),
    }
  }

  #[test]
  fn zip_extractor_unpacks_nested_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.zip");
    fs::write(&archive, zip_bytes(&[("zlib/zlib.h", "header"), ("zlib/src/inflate.c", "code")])).unwrap();

    let dest = temp.path().join("out");
    ZipExtractor.extract(&archive, &dest).unwrap();

    assert_eq!(fs::read_to_string(dest.join("zlib/zlib.h")).unwrap(), "header");
    assert_eq!(fs::read_to_string(dest.join("zlib/src/inflate.c")).unwrap(), "code");
  }

  #[test]
  fn zip_extractor_rejects_garbage() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.zip");
    fs::write(&archive, b"not a zip").unwrap();

    let result = ZipExtractor.extract(&archive, temp.path());
    assert!(matches!(result, Err(FetchError::Extract { .. })));
  }

  #[tokio::test]
  async fn downloads_extracts_and_removes_archive() {
    let mut server = Server::new_async().await;
    let _m = server
      .mock("GET", "/zlib.zip")
      .with_status(200)
      .with_body(zip_bytes(&[("zlib.h", "header")]))
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("vendor/src/zlib");
    let client = ReqwestClient::new(Duration::from_secs(10)).unwrap();

    fetch_archive(
      &client,
      Arc::new(ZipExtractor),
      &spec(format!("{}/zlib.zip", server.url())),
      &dest,
      &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(fs::read_to_string(dest.join("zlib.h")).unwrap(), "header");
    assert!(!dest.join("zlib.zip").exists());
  }

  #[tokio::test]
  async fn failed_extraction_keeps_archive() {
    let mut server = Server::new_async().await;
    let _m = server
      .mock("GET", "/zlib.zip")
      .with_status(200)
      .with_body("corrupt")
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("zlib");
    let client = ReqwestClient::new(Duration::from_secs(10)).unwrap();

    let result = fetch_archive(
      &client,
      Arc::new(ZipExtractor),
      &spec(format!("{}/zlib.zip", server.url())),
      &dest,
      &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(FetchError::Extract { .. })));
    assert!(dest.join("zlib.zip").exists());
  }

  #[tokio::test]
  async fn error_status_fails_after_creating_destination() {
    let mut server = Server::new_async().await;
    let _m = server.mock("GET", "/zlib.zip").with_status(403).create_async().await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("zlib");
    let client = ReqwestClient::new(Duration::from_secs(10)).unwrap();

    let result = fetch_archive(
      &client,
      Arc::new(ZipExtractor),
      &spec(format!("{}/zlib.zip", server.url())),
      &dest,
      &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(FetchError::Status { status: 403, .. })));
    assert!(dest.exists());
  }
}
