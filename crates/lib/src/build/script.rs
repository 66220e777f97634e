//! Build script generation.
//!
//! Instead of running instructions, the build phase can emit them as a POSIX shell script
//! that performs the same build when executed later:
//!
//! ```text
//! #!/bin/sh
//! set -e
//!
//! ## package zlib
//! cd '/proj/vendor/src/zlib'
//! ./configure --prefix=/proj/vendor/pkg/zlib && make install
//! ```

use std::path::Path;

use tracing::info;

use super::types::{BuildError, PackagePlan};

/// Render `plans` as a shell script, one labeled section per package.
pub fn render_script(plans: &[PackagePlan]) -> String {
  let mut script = String::from("#!/bin/sh\nset -e\n");

  for plan in plans {
    script.push_str(&format!(
      "\n## package {}\ncd {}\n",
      plan.name,
      shell_quote(&plan.src_path.to_string_lossy())
    ));
    for instruction in &plan.instructions {
      script.push_str(instruction);
      script.push('\n');
    }
  }

  script
}

/// Write `script` to `path` and make it executable.
pub fn write_script(path: &Path, script: &str) -> Result<(), BuildError> {
  let write_err = |source| BuildError::WriteScript {
    path: path.to_path_buf(),
    source,
  };

  std::fs::write(path, script).map_err(write_err)?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(write_err)?;
  }

  info!(path = %path.display(), "wrote build script");
  Ok(())
}

/// Quote `value` for a POSIX shell by wrapping it in single quotes.
pub(crate) fn shell_quote(value: &str) -> String {
  format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;
  use tempfile::TempDir;

  fn plan(name: &str, instructions: &[&str]) -> PackagePlan {
    PackagePlan {
      name: name.to_string(),
      src_path: PathBuf::from(format!("/proj/vendor/src/{name}")),
      instructions: instructions.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn renders_one_section_per_package() {
    let script = render_script(&[plan("zlib", &["make", "make install"]), plan("png", &["cmake ."])]);

    assert_eq!(
      script,
      "#!/bin/sh\nset -e\n\
       \n## package zlib\ncd '/proj/vendor/src/zlib'\nmake\nmake install\n\
       \n## package png\ncd '/proj/vendor/src/png'\ncmake .\n"
    );
  }

  #[test]
  fn empty_plan_list_is_just_the_preamble() {
    assert_eq!(render_script(&[]), "#!/bin/sh\nset -e\n");
  }

  #[test]
  fn quotes_single_quotes() {
    assert_eq!(shell_quote("/a b/it's"), r"'/a b/it'\''s'");
  }

  #[cfg(unix)]
  #[test]
  fn written_script_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("build.sh");
    write_script(&path, "#!/bin/sh\n").unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "#!/bin/sh\n");
  }
}
