//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, human-readable durations, and the dependency tree view.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use pkg_lib::{DependencyTree, DownloadStatus};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const PENDING: &str = "○";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Print the packages below `root`, one line per node, indented by depth.
pub fn print_tree(root: &DependencyTree) {
  print_children(root, 1);
}

fn print_children(node: &DependencyTree, depth: usize) {
  for child in &node.children {
    let symbol = match child.status {
      DownloadStatus::Fetched => symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
      DownloadStatus::Skipped => symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()).to_string(),
      DownloadStatus::Empty => symbols::PENDING.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
    };
    let status = format!("({})", child.status);

    println!(
      "{}{} {} {}",
      "  ".repeat(depth),
      symbol,
      child.package_name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      status.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    print_children(child, depth + 1);
  }
}
