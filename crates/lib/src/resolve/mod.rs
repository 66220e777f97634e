//! Recursive dependency resolution.
//!
//! The resolver turns a manifest into a [`DependencyTree`] by fetching every declared package
//! into `<home>/vendor/src/<name>` and walking the manifests found inside fetched git packages.
//!
//! # Concurrency
//!
//! Every package of a manifest is resolved in its own task. A global semaphore bounds how many
//! fetches run at once; a permit is only held for the duration of a fetch, so tasks waiting for
//! their nested dependencies never starve the pool. Children are written into slots allocated
//! by declared index, which keeps the tree identical to the manifest order no matter which
//! fetch finishes first.
//!
//! # Failure
//!
//! The first failure cancels all in-flight work. Already fetched packages are left in place.

mod types;

pub use types::{ResolveConfig, ResolveError};

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fetch::{FetchError, Fetcher};
use crate::layout::VendorLayout;
use crate::manifest::{Manifest, PackageSpec};
use crate::tree::{DependencyTree, DownloadStatus};

type Children = Pin<Box<dyn Future<Output = Result<Vec<DependencyTree>, ResolveError>> + Send>>;

/// Resolves manifests into dependency trees.
#[derive(Debug, Clone)]
pub struct Resolver {
  fetcher: Fetcher,
  config: ResolveConfig,
}

impl Resolver {
  pub fn new(fetcher: Fetcher, config: ResolveConfig) -> Self {
    Self { fetcher, config }
  }

  /// Resolve `manifest` for the project rooted at `home`.
  pub async fn resolve(&self, home: &Path, manifest: &Manifest) -> Result<DependencyTree, ResolveError> {
    self.resolve_with_cancel(home, manifest, &CancellationToken::new()).await
  }

  /// Like [`resolve`](Self::resolve), stopping early when `cancel` fires.
  pub async fn resolve_with_cancel(
    &self,
    home: &Path,
    manifest: &Manifest,
    cancel: &CancellationToken,
  ) -> Result<DependencyTree, ResolveError> {
    manifest
      .validate()
      .map_err(|source| ResolveError::InvalidManifest { source })?;

    let layout = VendorLayout::new(home);
    info!(
      home = %layout.home().display(),
      packages = manifest.len(),
      jobs = self.config.jobs,
      "resolving dependencies"
    );

    let walk = Arc::new(Walk {
      fetcher: self.fetcher.clone(),
      config: self.config.clone(),
      permits: Arc::new(Semaphore::new(self.config.jobs.max(1))),
      cancel: cancel.child_token(),
      dest_locks: Mutex::new(HashMap::new()),
      layout,
    });

    let mut root = DependencyTree::root(walk.layout.home());
    root.children = walk.clone().resolve_manifest(manifest.clone(), Arc::new(Vec::new())).await?;

    info!(packages = root.len(), "resolved dependencies");
    Ok(root)
  }
}

/// State shared by every task of one resolution run.
struct Walk {
  fetcher: Fetcher,
  config: ResolveConfig,
  layout: VendorLayout,
  permits: Arc<Semaphore>,
  cancel: CancellationToken,
  dest_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl Walk {
  /// Resolve every package of `manifest` concurrently, returning tree nodes in declared order.
  ///
  /// `chain` holds the names of the git packages whose manifests led here.
  fn resolve_manifest(self: Arc<Self>, manifest: Manifest, chain: Arc<Vec<String>>) -> Children {
    Box::pin(async move {
      let packages = manifest.packages();
      let mut slots: Vec<Option<DependencyTree>> = (0..packages.len()).map(|_| None).collect();

      let mut join_set = JoinSet::new();
      for (index, spec) in packages.into_iter().enumerate() {
        let walk = self.clone();
        let chain = chain.clone();
        join_set.spawn(async move { (index, walk.resolve_package(spec, chain).await) });
      }

      let mut first_error: Option<ResolveError> = None;
      while let Some(joined) = join_set.join_next().await {
        let outcome = match joined {
          Ok((index, result)) => result.map(|node| slots[index] = node),
          Err(e) => Err(ResolveError::Task(e.to_string())),
        };

        if let Err(e) = outcome {
          if !e.is_cancelled() {
            debug!(error = %e, "cancelling in-flight fetches");
          }
          self.cancel.cancel();
          if first_error.as_ref().is_none_or(|current| current.is_cancelled() && !e.is_cancelled()) {
            first_error = Some(e);
          }
        }
      }

      match first_error {
        Some(e) => Err(e),
        None => Ok(slots.into_iter().flatten().collect()),
      }
    })
  }

  /// Fetch one package and, for git packages, resolve its nested manifest.
  ///
  /// Returns `None` for packages that are not part of the tree (archives).
  async fn resolve_package(
    self: Arc<Self>,
    spec: PackageSpec,
    chain: Arc<Vec<String>>,
  ) -> Result<Option<DependencyTree>, ResolveError> {
    let name = spec.name().to_string();

    if spec.is_recursive() && chain.contains(&name) {
      let mut cycle: Vec<&str> = chain.iter().map(String::as_str).collect();
      cycle.push(&name);
      return Err(ResolveError::Cycle {
        chain: cycle.join(" -> "),
      });
    }

    let dest = self.layout.src_dir(&name);
    let mut node = DependencyTree::new(&name, &dest, spec.build());
    node.record_fetch(self.fetch_once(&spec, &dest).await?);

    if spec.is_recursive() {
      match Manifest::load(&dest) {
        Ok(Some(nested)) => {
          debug!(pkg = %name, packages = nested.len(), "resolving nested manifest");
          let mut next = chain.as_ref().clone();
          next.push(name.clone());
          node.children = self.clone().resolve_manifest(nested, Arc::new(next)).await?;
        }
        Ok(None) => debug!(pkg = %name, "no nested manifest"),
        Err(source) => return Err(ResolveError::Manifest { package: name, source }),
      }
    }

    Ok(spec.is_tree_node().then_some(node))
  }

  /// Fetch `spec` into `dest` unless the destination already exists.
  async fn fetch_once(&self, spec: &PackageSpec, dest: &Path) -> Result<DownloadStatus, ResolveError> {
    let name = spec.name();
    let lock = self.dest_lock(dest);
    let _guard = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Err(ResolveError::Cancelled),
      guard = lock.lock_owned() => guard,
    };

    if matches!(tokio::fs::try_exists(dest).await, Ok(true)) {
      info!(pkg = name, storage = %dest.display(), "package already present, skipping");
      return Ok(DownloadStatus::Skipped);
    }

    let _permit = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Err(ResolveError::Cancelled),
      permit = self.permits.clone().acquire_owned() => permit.map_err(|_| ResolveError::Cancelled)?,
    };

    match self.fetch_with_retries(spec, dest).await {
      Ok(()) => {
        info!(pkg = name, kind = spec.kind(), storage = %dest.display(), "fetched package");
        Ok(DownloadStatus::Fetched)
      }
      Err(source) => {
        if self.config.clean_failed
          && let Err(e) = remove_dir(dest).await
        {
          warn!(pkg = name, storage = %dest.display(), error = %e, "failed to clean up after failed fetch");
        }
        Err(ResolveError::Fetch {
          name: name.to_string(),
          source,
        })
      }
    }
  }

  async fn fetch_with_retries(&self, spec: &PackageSpec, dest: &Path) -> Result<(), FetchError> {
    let mut attempt = 0;
    loop {
      let err = match self.fetcher.fetch(spec, dest, &self.cancel).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
      };

      if !err.is_transient() || attempt >= self.config.retries || self.cancel.is_cancelled() {
        return Err(err);
      }
      attempt += 1;
      warn!(
        pkg = spec.name(),
        attempt,
        retries = self.config.retries,
        error = %err,
        "fetch failed, retrying"
      );

      if let Err(e) = remove_dir(dest).await {
        warn!(pkg = spec.name(), storage = %dest.display(), error = %e, "failed to remove partial fetch");
        return Err(err);
      }

      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
        _ = tokio::time::sleep(self.config.retry_delay) => {}
      }
    }
  }

  /// The lock serializing fetches into `dest`.
  fn dest_lock(&self, dest: &Path) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.dest_locks.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(dest.to_path_buf()).or_default().clone()
  }
}

/// Remove `dir` and everything below it; a missing directory is fine.
async fn remove_dir(dir: &Path) -> Result<(), ResolveError> {
  match tokio::fs::remove_dir_all(dir).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(ResolveError::Cleanup {
      path: dir.to_path_buf(),
      source,
    }),
  }
}
