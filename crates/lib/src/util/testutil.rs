//! Test utilities for pkg-lib.
//!
//! In-memory stand-ins for the network capabilities so that fetching and resolution can be
//! exercised without a git server.

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use zip::write::SimpleFileOptions;

use crate::auth::redact;
use crate::consts::{GIT_METADATA_DIR, MANIFEST_FILENAME};
use crate::fetch::{FetchError, GitClient};

/// Build an in-memory zip archive from `(name, content)` pairs.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
  let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
  for (name, content) in entries {
    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
    writer.write_all(content.as_bytes()).unwrap();
  }
  writer.finish().unwrap().into_inner()
}

/// Write `json` as the manifest of `dir`.
pub fn write_manifest(dir: &Path, json: &str) {
  fs::create_dir_all(dir).unwrap();
  fs::write(dir.join(MANIFEST_FILENAME), json).unwrap();
}

/// Contents served by [`FakeGit`] for one repository URL.
#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
  files: Vec<(String, String)>,
  delay: Duration,
}

impl FakeRepo {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn file(mut self, path: &str, content: &str) -> Self {
    self.files.push((path.to_string(), content.to_string()));
    self
  }

  /// Ship a nested `pkg.json`.
  pub fn manifest(self, json: &str) -> Self {
    self.file(MANIFEST_FILENAME, json)
  }

  /// Make clones of this repository take at least `delay`.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }
}

/// A recorded [`GitClient::clone_repo`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCall {
  pub url: String,
  pub reference: Option<String>,
  pub hash: Option<String>,
}

/// [`GitClient`] that "clones" by writing files from memory, including a `.git` directory.
#[derive(Debug, Default)]
pub struct FakeGit {
  repos: HashMap<String, FakeRepo>,
  delay: Duration,
  calls: Mutex<Vec<GitCall>>,
  active: AtomicUsize,
  max_active: AtomicUsize,
}

impl FakeGit {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_repo(mut self, url: &str, repo: FakeRepo) -> Self {
    self.repos.insert(url.to_string(), repo);
    self
  }

  /// Delay applied to every clone, on top of per-repository delays.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn calls(&self) -> Vec<GitCall> {
    self.calls.lock().unwrap().clone()
  }

  /// URLs cloned so far, in call order.
  pub fn cloned_urls(&self) -> Vec<String> {
    self.calls().into_iter().map(|c| c.url).collect()
  }

  /// Highest number of clones observed running at the same time.
  pub fn max_concurrent(&self) -> usize {
    self.max_active.load(Ordering::SeqCst)
  }

  fn wait(&self, delay: Duration, interrupt: &AtomicBool) -> Result<(), FetchError> {
    let step = Duration::from_millis(5);
    let mut waited = Duration::ZERO;
    while waited < delay {
      if interrupt.load(Ordering::Relaxed) {
        return Err(FetchError::Cancelled);
      }
      std::thread::sleep(step);
      waited += step;
    }
    Ok(())
  }
}

impl GitClient for FakeGit {
  fn clone_repo(
    &self,
    url: &str,
    dest: &Path,
    reference: Option<&str>,
    hash: Option<&str>,
    interrupt: &AtomicBool,
  ) -> Result<(), FetchError> {
    self.calls.lock().unwrap().push(GitCall {
      url: url.to_string(),
      reference: reference.map(str::to_string),
      hash: hash.map(str::to_string),
    });

    let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_active.fetch_max(active, Ordering::SeqCst);

    let result = self.clone_into(url, dest, interrupt);

    self.active.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

impl FakeGit {
  fn clone_into(&self, url: &str, dest: &Path, interrupt: &AtomicBool) -> Result<(), FetchError> {
    let Some(repo) = self.repos.get(url) else {
      self.wait(self.delay, interrupt)?;
      return Err(FetchError::Clone {
        url: redact(url),
        source: "repository not found".into(),
      });
    };

    self.wait(self.delay + repo.delay, interrupt)?;

    let write_err = |path: &Path, e: std::io::Error| FetchError::Write {
      path: path.to_path_buf(),
      source: e,
    };

    let git_dir = dest.join(GIT_METADATA_DIR);
    fs::create_dir_all(&git_dir).map_err(|e| write_err(&git_dir, e))?;
    fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").map_err(|e| write_err(&git_dir, e))?;

    for (path, content) in &repo.files {
      let target = dest.join(path);
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
      }
      fs::write(&target, content).map_err(|e| write_err(&target, e))?;
    }

    Ok(())
  }
}
