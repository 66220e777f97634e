//! pkg-lib: Resolution and build core for the `pkg` source package manager
//!
//! This crate provides everything between a decoded `pkg.json` and a built vendor tree:
//! - `Manifest`: the declared archive, files and git packages of a project
//! - `Fetcher`: materializes a package's source into `vendor/src/<name>`
//! - `Resolver`: walks manifests recursively, producing a `DependencyTree`
//! - `build`: runs (or scripts) build instructions in dependency order

pub mod auth;
pub mod build;
pub mod consts;
pub mod fetch;
pub mod layout;
pub mod manifest;
pub mod placeholder;
pub mod platform;
pub mod resolve;
pub mod tree;
pub mod util;

pub use build::{BuildConfig, BuildError, BuildSummary, build_all, generate_script};
pub use fetch::{FetchError, Fetcher};
pub use layout::VendorLayout;
pub use manifest::{Manifest, ManifestError, PackageSpec};
pub use resolve::{ResolveConfig, ResolveError, Resolver};
pub use tree::{DependencyTree, DownloadStatus};
