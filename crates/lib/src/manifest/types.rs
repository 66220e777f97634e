//! Manifest types for pkg.
//!
//! The manifest (`pkg.json`) declares a project's dependencies in three buckets,
//! keyed by package name:
//!
//! ```json
//! {
//!   "packages": {
//!     "archive": { "zlib": { "path": "https://example.com/zlib.zip" } },
//!     "files": {
//!       "json": {
//!         "path": "https://raw.example.com/json/v3",
//!         "files": { "single_include/json.hpp": "json.hpp" }
//!       }
//!     },
//!     "git": {
//!       "fmt": {
//!         "path": "https://github.com/fmtlib/fmt.git",
//!         "tag": "10.2.1",
//!         "build": { "build": ["cmake -B build -DCMAKE_INSTALL_PREFIX=$${pkg}"] }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! # Ordering
//!
//! Buckets use [`IndexMap`] so that the declared order of packages survives decoding.
//! Resolution visits packages in exactly that order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A decoded `pkg.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
  #[serde(default)]
  pub packages: Packages,
}

/// The three package buckets of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packages {
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub archive: IndexMap<String, ArchiveEntry>,

  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub files: IndexMap<String, FilesEntry>,

  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub git: IndexMap<String, GitEntry>,
}

/// Build instructions attached to a manifest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecipe {
  /// The package's own build instructions.
  #[serde(rename = "self", default, skip_serializing_if = "Vec::is_empty")]
  pub self_build: Vec<String>,

  /// Instructions supplied by the consumer, replacing `self_build` entirely when non-empty.
  #[serde(rename = "build", default, skip_serializing_if = "Vec::is_empty")]
  pub outer_build: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
  /// URL of the zip archive.
  pub path: String,

  #[serde(default)]
  pub build: BuildRecipe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesEntry {
  /// Base URL that every remote suffix is joined onto.
  pub path: String,

  /// Remote suffix -> local file name (relative to the package source directory).
  #[serde(default)]
  pub files: IndexMap<String, String>,

  #[serde(default)]
  pub build: BuildRecipe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitEntry {
  /// Repository URL.
  pub path: String,

  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub hash: String,

  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub branch: String,

  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub tag: String,

  #[serde(default)]
  pub build: BuildRecipe,
}

/// A single package to fetch, in resolution form.
///
/// This is the closed set of source kinds the fetcher understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSpec {
  Archive(ArchiveSpec),
  Files(FilesSpec),
  Git(GitSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
  pub name: String,
  pub source_url: String,
  pub build: BuildRecipe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesSpec {
  pub name: String,
  pub base_url: String,
  pub files: IndexMap<String, String>,
  pub build: BuildRecipe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSpec {
  pub name: String,
  pub repo_url: String,
  pub hash: Option<String>,
  pub branch: Option<String>,
  pub tag: Option<String>,
  pub build: BuildRecipe,
}

impl GitSpec {
  /// The reference the initial clone is restricted to.
  ///
  /// A branch takes precedence over a tag; `None` means the remote's default branch.
  pub fn reference(&self) -> Option<String> {
    match (&self.branch, &self.tag) {
      (Some(branch), _) => Some(format!("refs/heads/{branch}")),
      (None, Some(tag)) => Some(format!("refs/tags/{tag}")),
      (None, None) => None,
    }
  }
}

impl PackageSpec {
  pub fn name(&self) -> &str {
    match self {
      PackageSpec::Archive(spec) => &spec.name,
      PackageSpec::Files(spec) => &spec.name,
      PackageSpec::Git(spec) => &spec.name,
    }
  }

  pub fn build(&self) -> &BuildRecipe {
    match self {
      PackageSpec::Archive(spec) => &spec.build,
      PackageSpec::Files(spec) => &spec.build,
      PackageSpec::Git(spec) => &spec.build,
    }
  }

  /// Short name of the source kind, used in logs.
  pub fn kind(&self) -> &'static str {
    match self {
      PackageSpec::Archive(_) => "archive",
      PackageSpec::Files(_) => "files",
      PackageSpec::Git(_) => "git",
    }
  }

  /// Whether the fetched source may contain a nested manifest that must be resolved.
  pub fn is_recursive(&self) -> bool {
    matches!(self, PackageSpec::Git(_))
  }

  /// Whether the package becomes a node of the dependency tree.
  ///
  /// Archives are fetched as flat bundles and are not attached to the tree.
  pub fn is_tree_node(&self) -> bool {
    !matches!(self, PackageSpec::Archive(_))
  }
}

fn non_empty(value: &str) -> Option<String> {
  if value.is_empty() {
    None
  } else {
    Some(value.to_string())
  }
}

impl ArchiveEntry {
  pub fn to_spec(&self, name: &str) -> ArchiveSpec {
    ArchiveSpec {
      name: name.to_string(),
      source_url: self.path.clone(),
      build: self.build.clone(),
    }
  }
}

impl FilesEntry {
  pub fn to_spec(&self, name: &str) -> FilesSpec {
    FilesSpec {
      name: name.to_string(),
      base_url: self.path.clone(),
      files: self.files.clone(),
      build: self.build.clone(),
    }
  }
}

impl GitEntry {
  pub fn to_spec(&self, name: &str) -> GitSpec {
    GitSpec {
      name: name.to_string(),
      repo_url: self.path.clone(),
      hash: non_empty(&self.hash),
      branch: non_empty(&self.branch),
      tag: non_empty(&self.tag),
      build: self.build.clone(),
    }
  }
}

impl Manifest {
  /// All packages in resolution order: archive, then files, then git,
  /// each bucket in declared order.
  pub fn packages(&self) -> Vec<PackageSpec> {
    let archive = self
      .packages
      .archive
      .iter()
      .map(|(name, entry)| PackageSpec::Archive(entry.to_spec(name)));
    let files = self
      .packages
      .files
      .iter()
      .map(|(name, entry)| PackageSpec::Files(entry.to_spec(name)));
    let git = self
      .packages
      .git
      .iter()
      .map(|(name, entry)| PackageSpec::Git(entry.to_spec(name)));

    archive.chain(files).chain(git).collect()
  }

  /// Total number of declared packages across all buckets.
  pub fn len(&self) -> usize {
    self.packages.archive.len() + self.packages.files.len() + self.packages.git.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
