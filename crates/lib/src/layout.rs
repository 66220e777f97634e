//! Filesystem layout of a project's vendor tree.
//!
//! Every location pkg touches is derived from the manifest home directory:
//!
//! ```text
//! <home>/pkg.json
//! <home>/vendor/src/<name>/   fetched sources (existence is the only "already fetched" signal)
//! <home>/vendor/pkg/<name>/   install prefix offered to build instructions
//! ```

use std::path::{Path, PathBuf};

use crate::consts::{INSTALL_DIR, MANIFEST_FILENAME, SRC_DIR, VENDOR_DIR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorLayout {
  home: PathBuf,
}

impl VendorLayout {
  /// Create a layout rooted at `home`.
  ///
  /// The home is canonicalized when it exists so that every derived path is absolute.
  pub fn new(home: impl AsRef<Path>) -> Self {
    let home = home.as_ref();
    let home = dunce::canonicalize(home).unwrap_or_else(|_| home.to_path_buf());
    Self { home }
  }

  pub fn home(&self) -> &Path {
    &self.home
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.home.join(MANIFEST_FILENAME)
  }

  pub fn vendor_root(&self) -> PathBuf {
    self.home.join(VENDOR_DIR)
  }

  /// Destination of a package's fetched source.
  pub fn src_dir(&self, name: &str) -> PathBuf {
    self.home.join(Self::relative_src_dir(name))
  }

  /// Install prefix for a package's build artifacts.
  pub fn install_dir(&self, name: &str) -> PathBuf {
    self.home.join(Self::relative_install_dir(name))
  }

  pub fn relative_src_dir(name: &str) -> PathBuf {
    Path::new(VENDOR_DIR).join(SRC_DIR).join(name)
  }

  pub fn relative_install_dir(name: &str) -> PathBuf {
    Path::new(VENDOR_DIR).join(INSTALL_DIR).join(name)
  }
}
