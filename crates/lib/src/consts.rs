/// Application name, used for configuration directories.
pub const APP_NAME: &str = "pkg";

/// Name of the manifest file found at the root of a project or fetched package.
pub const MANIFEST_FILENAME: &str = "pkg.json";

/// Name of the credentials file inside the configuration directory.
pub const AUTH_FILENAME: &str = "auth.json";

/// Directory (relative to the manifest home) holding everything managed by pkg.
pub const VENDOR_DIR: &str = "vendor";

/// Directory under [`VENDOR_DIR`] holding fetched sources.
pub const SRC_DIR: &str = "src";

/// Directory under [`VENDOR_DIR`] offered to builds as install prefixes.
pub const INSTALL_DIR: &str = "pkg";

/// Name of the version-control metadata directory removed after a git fetch.
pub const GIT_METADATA_DIR: &str = ".git";
