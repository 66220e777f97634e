//! Implementation of the `pkg fetch` command.
//!
//! Resolves the manifest, fetching every missing package into `vendor/src`, and prints
//! the resulting dependency tree.

use std::time::Instant;

use anyhow::Result;

use crate::cmd::resolve::{ResolveArgs, resolve_dependencies, run_cancellable};
use crate::output::{OutputFormat, format_duration, print_info, print_json, print_success, print_tree};

/// Execute the fetch command.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or any package fails to fetch.
pub fn cmd_fetch(args: &ResolveArgs, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let (_layout, tree) = run_cancellable(|cancel| async move { resolve_dependencies(args, &cancel).await })?;

  if output.is_json() {
    return print_json(&tree);
  }

  if tree.is_empty() {
    print_info("No dependencies declared");
    return Ok(());
  }

  print_success(&format!(
    "Resolved {} package(s) in {}",
    tree.len(),
    format_duration(start.elapsed())
  ));
  print_tree(&tree);

  Ok(())
}
