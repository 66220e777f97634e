//! Building resolved packages.
//!
//! The build phase consumes the resolved tree in build order (every dependency before its
//! dependents). For each package it selects the instructions to run (a consumer-supplied
//! override replaces the package's own instructions entirely), substitutes placeholders
//! against the package's variables, and then either:
//!
//! - runs every instruction in the package's source directory ([`build_all`]), stopping at
//!   the first failure, or
//! - emits the instructions as a shell script ([`generate_script`]).
//!
//! # Variables
//!
//! | Variable  | Value                                  |
//! |-----------|----------------------------------------|
//! | `home`    | the project directory holding `pkg.json` |
//! | `vendor`  | `<home>/vendor`                        |
//! | `name`    | the package name                       |
//! | `src`     | `<home>/vendor/src/<name>`             |
//! | `pkg`     | `<home>/vendor/pkg/<name>`             |
//! | `src_rel` | `vendor/src/<name>`                    |
//! | `pkg_rel` | `vendor/pkg/<name>`                    |

mod cmd;
mod script;
mod types;

pub use script::write_script;
pub use types::{BuildConfig, BuildError, BuildSummary, PackagePlan};

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::layout::VendorLayout;
use crate::placeholder::{Vars, substitute};
use crate::tree::DependencyTree;

/// Variables available to `node`'s instructions.
pub fn package_vars(layout: &VendorLayout, node: &DependencyTree) -> Vars {
  let name = node.package_name.as_str();
  Vars::new()
    .with("home", layout.home().display().to_string())
    .with("vendor", layout.vendor_root().display().to_string())
    .with("name", name)
    .with("src", node.src_path.display().to_string())
    .with("pkg", layout.install_dir(name).display().to_string())
    .with("src_rel", VendorLayout::relative_src_dir(name).display().to_string())
    .with("pkg_rel", VendorLayout::relative_install_dir(name).display().to_string())
}

/// Select and substitute the instructions of every node.
pub fn prepare(nodes: &[&DependencyTree], home: &Path) -> Result<Vec<PackagePlan>, BuildError> {
  let layout = VendorLayout::new(home);

  nodes
    .iter()
    .map(|node| -> Result<PackagePlan, BuildError> {
      let vars = package_vars(&layout, node);
      let instructions = node
        .instructions()
        .iter()
        .enumerate()
        .map(|(index, template)| {
          substitute(template, &vars).map_err(|source| BuildError::Placeholder {
            package: node.package_name.clone(),
            index,
            instruction: template.clone(),
            source,
          })
        })
        .collect::<Result<Vec<_>, _>>()?;

      Ok(PackagePlan {
        name: node.package_name.clone(),
        src_path: node.src_path.clone(),
        instructions,
      })
    })
    .collect()
}

/// Build `nodes` in the given order.
pub async fn build_all(
  nodes: &[&DependencyTree],
  home: &Path,
  config: &BuildConfig,
) -> Result<BuildSummary, BuildError> {
  build_all_with_cancel(nodes, home, config, &CancellationToken::new()).await
}

/// Like [`build_all`], killing the running instruction when `cancel` fires.
///
/// All instructions are substituted before the first one runs, so a bad template fails the
/// build without side effects.
pub async fn build_all_with_cancel(
  nodes: &[&DependencyTree],
  home: &Path,
  config: &BuildConfig,
  cancel: &CancellationToken,
) -> Result<BuildSummary, BuildError> {
  let plans = prepare(nodes, home)?;
  let mut summary = BuildSummary::default();

  for plan in &plans {
    if plan.instructions.is_empty() {
      debug!(pkg = %plan.name, "no build instructions");
      continue;
    }

    info!(pkg = %plan.name, "installing package");
    for (index, instruction) in plan.instructions.iter().enumerate() {
      info!(pkg = %plan.name, index, instruction = %instruction, "running instruction");

      let status = cmd::execute_cmd(
        instruction,
        &plan.src_path,
        config.shell.as_deref(),
        config.verbose,
        cancel,
      )
      .await
      .map_err(|source| BuildError::Spawn {
        package: plan.name.clone(),
        instruction: instruction.clone(),
        source,
      })?
      .ok_or(BuildError::Cancelled)?;

      if !status.success() {
        return Err(BuildError::Failed {
          package: plan.name.clone(),
          index,
          instruction: instruction.clone(),
          code: status.code(),
        });
      }
      summary.instructions += 1;
    }

    summary.packages += 1;
    info!(pkg = %plan.name, "package installed");
  }

  Ok(summary)
}

/// Render the build of `nodes` as a shell script instead of running it.
pub fn generate_script(nodes: &[&DependencyTree], home: &Path) -> Result<String, BuildError> {
  let plans = prepare(nodes, home)?;
  Ok(script::render_script(&plans))
}
