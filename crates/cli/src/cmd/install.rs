//! Implementation of the `pkg install` command.
//!
//! Resolves the manifest, then builds every package in dependency order, or writes the
//! build as a shell script when `--script` is given.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use pkg_lib::build::{BuildConfig, build_all_with_cancel, generate_script, write_script};

use crate::cmd::resolve::{ResolveArgs, resolve_dependencies, run_cancellable};
use crate::output::{format_duration, print_info, print_stat, print_success};

/// Execute the install command.
///
/// # Errors
///
/// Returns an error if resolution fails, an instruction cannot be substituted, or an
/// instruction exits unsuccessfully.
pub fn cmd_install(args: &ResolveArgs, script: Option<&Path>, shell: Option<String>, verbose: bool) -> Result<()> {
  let start = Instant::now();

  let summary = run_cancellable(|cancel| async move {
    let (layout, tree) = resolve_dependencies(args, &cancel).await?;
    let order = tree.build_order();

    if let Some(path) = script {
      let text = generate_script(&order, layout.home()).context("Failed to generate build script")?;
      write_script(path, &text)?;
      return Ok(None);
    }

    let config = BuildConfig { verbose, shell };
    let summary = build_all_with_cancel(&order, layout.home(), &config, &cancel)
      .await
      .context("Build failed")?;
    Ok::<_, anyhow::Error>(Some(summary))
  })?;

  match (summary, script) {
    (None, Some(path)) => print_success(&format!("Wrote build script to {}", path.display())),
    (Some(summary), _) if summary.packages == 0 => print_info("Nothing to build"),
    (Some(summary), _) => {
      print_success(&format!("Install complete in {}", format_duration(start.elapsed())));
      print_stat("Packages built", &summary.packages.to_string());
      print_stat("Instructions run", &summary.instructions.to_string());
    }
    (None, None) => {}
  }

  Ok(())
}
