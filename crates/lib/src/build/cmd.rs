//! Running a single build instruction.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run `instruction` through the shell with `cwd` as working directory.
///
/// The environment is inherited. With `verbose`, output goes straight to the terminal;
/// otherwise it is captured and logged at debug level when the instruction fails.
///
/// Returns `Ok(None)` when `cancel` fired first; the child is killed in that case.
pub(crate) async fn execute_cmd(
  instruction: &str,
  cwd: &Path,
  shell: Option<&str>,
  verbose: bool,
  cancel: &CancellationToken,
) -> std::io::Result<Option<ExitStatus>> {
  if cancel.is_cancelled() {
    return Ok(None);
  }

  let (shell_cmd, shell_args) = get_shell(shell);

  let mut command = Command::new(&shell_cmd);
  command
    .args(&shell_args)
    .arg(instruction)
    .current_dir(cwd)
    .stdin(Stdio::null())
    .kill_on_drop(true);

  if verbose {
    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
  } else {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
  }

  debug!(shell = %shell_cmd, working_dir = %cwd.display(), "spawning process");
  let child = command.spawn()?;

  let output = tokio::select! {
    biased;
    _ = cancel.cancelled() => return Ok(None),
    output = child.wait_with_output() => output?,
  };

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command stdout");
    }
  }

  Ok(Some(output.status))
}

/// Get the shell command and arguments used to run an instruction.
fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}
