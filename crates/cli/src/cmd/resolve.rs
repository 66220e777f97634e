//! Dependency resolution shared by `pkg fetch` and `pkg install`.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pkg_lib::auth::Credentials;
use pkg_lib::fetch::FetchConfig;
use pkg_lib::platform::paths;
use pkg_lib::{DependencyTree, Fetcher, Manifest, ResolveConfig, Resolver, VendorLayout};

/// Options controlling how dependencies are fetched.
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
  /// Directory containing pkg.json
  #[arg(short = 'p', long, default_value = ".")]
  pub home: PathBuf,

  /// Maximum number of concurrent fetches (default: number of CPUs)
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Timeout for each HTTP request
  #[arg(long, value_parser = humantime::parse_duration, default_value = "2m")]
  pub timeout: Duration,

  /// Timeout for each git clone
  #[arg(long, value_parser = humantime::parse_duration, default_value = "10m")]
  pub git_timeout: Duration,

  /// Retry transient fetch failures this many times
  #[arg(long, default_value_t = 0)]
  pub retries: u32,

  /// Remove the source directory of a package whose fetch failed
  #[arg(long)]
  pub clean_failed: bool,

  /// Credentials file for private git repositories (default: <config dir>/auth.json)
  #[arg(long, value_name = "FILE")]
  pub auth: Option<PathBuf>,
}

/// Load the manifest under `args.home` and resolve it into a dependency tree.
pub async fn resolve_dependencies(
  args: &ResolveArgs,
  cancel: &CancellationToken,
) -> Result<(VendorLayout, DependencyTree)> {
  let layout = VendorLayout::new(&args.home);
  let manifest = Manifest::load_required(layout.home())
    .with_context(|| format!("Failed to load manifest {}", layout.manifest_path().display()))?;

  let credentials = match args.auth.clone().or_else(paths::auth_file) {
    Some(path) => {
      debug!(path = %path.display(), "loading credentials");
      Credentials::load(&path).with_context(|| format!("Failed to load credentials from {}", path.display()))?
    }
    None => Credentials::default(),
  };

  let fetch_config = FetchConfig {
    http_timeout: args.timeout,
    git_timeout: args.git_timeout,
  };
  let fetcher = Fetcher::new(fetch_config, credentials).context("Failed to initialize fetcher")?;

  let mut config = ResolveConfig {
    retries: args.retries,
    clean_failed: args.clean_failed,
    ..Default::default()
  };
  if let Some(jobs) = args.jobs {
    config.jobs = jobs;
  }

  let tree = Resolver::new(fetcher, config)
    .resolve_with_cancel(layout.home(), &manifest, cancel)
    .await
    .context("Failed to resolve dependencies")?;

  Ok((layout, tree))
}

/// How long blocking work may keep the process alive once a command has finished.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Run `task` on a fresh runtime, cancelling its token on Ctrl-C.
///
/// The runtime is shut down with a bound, so a stuck blocking operation cannot hold the
/// command past its own timeout.
pub fn run_cancellable<F, Fut, T>(task: F) -> Result<T>
where
  F: FnOnce(CancellationToken) -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let result = rt.block_on(async {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, cancelling");
        on_interrupt.cancel();
      }
    });

    task(cancel).await
  });

  rt.shutdown_timeout(SHUTDOWN_GRACE);
  result
}
