//! The dependency tree produced by resolution.
//!
//! The tree is built once by the [`Resolver`](crate::resolve::Resolver) and is read-only
//! afterwards. The root node stands for the project itself: it has no package name, is
//! never fetched and is never built.
//!
//! # Build order
//!
//! [`DependencyTree::post_order`] lists every node after all of its children, which is the
//! order builds must run in. [`DependencyTree::build_order`] additionally drops repeated
//! package names so that a package reached through several dependents is built once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::manifest::BuildRecipe;

/// Outcome of a package's fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DownloadStatus {
  /// Not fetched yet.
  #[default]
  #[serde(rename = "empty")]
  Empty,

  /// The destination already existed, nothing was downloaded.
  #[serde(rename = "skip")]
  Skipped,

  /// The source was downloaded into the destination.
  #[serde(rename = "ok")]
  Fetched,
}

impl std::fmt::Display for DownloadStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let label = match self {
      DownloadStatus::Empty => "empty",
      DownloadStatus::Skipped => "skip",
      DownloadStatus::Fetched => "ok",
    };
    f.write_str(label)
  }
}

/// A package in the resolved tree, together with everything needed to build it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyTree {
  /// Empty for the root.
  pub package_name: String,

  /// Where the package's source was fetched to.
  pub src_path: PathBuf,

  /// The package's own build instructions.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub self_build: Vec<String>,

  /// Instructions supplied by the consumer that declared this package.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub builder: Vec<String>,

  pub status: DownloadStatus,

  pub children: Vec<DependencyTree>,
}

impl DependencyTree {
  /// The unnamed root node for a project rooted at `home`.
  pub fn root(home: &Path) -> Self {
    Self {
      package_name: String::new(),
      src_path: home.to_path_buf(),
      self_build: Vec::new(),
      builder: Vec::new(),
      status: DownloadStatus::Empty,
      children: Vec::new(),
    }
  }

  /// A not-yet-fetched package node.
  pub fn new(name: impl Into<String>, src_path: impl Into<PathBuf>, recipe: &BuildRecipe) -> Self {
    Self {
      package_name: name.into(),
      src_path: src_path.into(),
      self_build: recipe.self_build.clone(),
      builder: recipe.outer_build.clone(),
      status: DownloadStatus::Empty,
      children: Vec::new(),
    }
  }

  pub fn is_root(&self) -> bool {
    self.package_name.is_empty()
  }

  /// Record the outcome of this node's fetch.
  ///
  /// The status leaves `Empty` exactly once; later calls are ignored.
  pub fn record_fetch(&mut self, status: DownloadStatus) {
    if self.status != DownloadStatus::Empty {
      warn!(pkg = %self.package_name, current = %self.status, "fetch outcome already recorded");
      return;
    }
    self.status = status;
  }

  /// The instructions to build this node with.
  ///
  /// A non-empty consumer override replaces the package's own instructions entirely.
  pub fn instructions(&self) -> &[String] {
    if self.builder.is_empty() {
      &self.self_build
    } else {
      &self.builder
    }
  }

  /// Every package node, each after all of its children. The root is not included.
  pub fn post_order(&self) -> Vec<&DependencyTree> {
    let mut nodes = Vec::new();
    self.collect_post_order(&mut nodes);
    nodes
  }

  fn collect_post_order<'a>(&'a self, nodes: &mut Vec<&'a DependencyTree>) {
    for child in &self.children {
      child.collect_post_order(nodes);
    }
    if !self.is_root() {
      nodes.push(self);
    }
  }

  /// [`post_order`](Self::post_order) keeping only the first node of each package name.
  pub fn build_order(&self) -> Vec<&DependencyTree> {
    let mut seen = HashSet::new();
    self
      .post_order()
      .into_iter()
      .filter(|node| seen.insert(node.package_name.as_str()))
      .collect()
  }

  /// Number of package nodes below this one.
  pub fn len(&self) -> usize {
    self.children.iter().map(|child| 1 + child.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.children.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(name: &str, children: Vec<DependencyTree>) -> DependencyTree {
    let mut node = DependencyTree::new(name, format!("/p/vendor/src/{name}"), &BuildRecipe::default());
    node.children = children;
    node
  }

  fn names(nodes: &[&DependencyTree]) -> Vec<String> {
    nodes.iter().map(|n| n.package_name.clone()).collect()
  }

  #[test]
  fn post_order_puts_children_first() {
    let mut root = DependencyTree::root(Path::new("/p"));
    root.children = vec![node("a", vec![node("b", vec![node("c", vec![])])]), node("d", vec![])];

    assert_eq!(names(&root.post_order()), vec!["c", "b", "a", "d"]);
    assert_eq!(root.len(), 4);
  }

  #[test]
  fn build_order_keeps_first_occurrence() {
    let mut root = DependencyTree::root(Path::new("/p"));
    root.children = vec![
      node("app", vec![node("zlib", vec![])]),
      node("png", vec![node("zlib", vec![])]),
    ];

    assert_eq!(names(&root.post_order()), vec!["zlib", "app", "zlib", "png"]);
    assert_eq!(names(&root.build_order()), vec!["zlib", "app", "png"]);
  }

  #[test]
  fn outer_build_replaces_self_build() {
    let recipe = BuildRecipe {
      self_build: vec!["make".to_string()],
      outer_build: vec!["cmake .".to_string(), "cmake --build .".to_string()],
    };
    let overridden = DependencyTree::new("a", "/p/a", &recipe);
    assert_eq!(overridden.instructions(), ["cmake .", "cmake --build ."]);

    let own = DependencyTree::new(
      "b",
      "/p/b",
      &BuildRecipe {
        self_build: vec!["make".to_string()],
        outer_build: vec![],
      },
    );
    assert_eq!(own.instructions(), ["make"]);
  }

  #[test]
  fn status_is_recorded_once() {
    let mut n = node("a", vec![]);
    assert_eq!(n.status, DownloadStatus::Empty);

    n.record_fetch(DownloadStatus::Fetched);
    n.record_fetch(DownloadStatus::Skipped);
    assert_eq!(n.status, DownloadStatus::Fetched);
  }

  #[test]
  fn serializes_status_labels() {
    let mut n = node("a", vec![]);
    n.record_fetch(DownloadStatus::Skipped);

    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["package_name"], "a");
    assert_eq!(json["status"], "skip");
    assert!(json.get("builder").is_none());
  }
}
