mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::ResolveArgs;
use output::{OutputFormat, print_error};

/// pkg - fetch and build the source dependencies declared in pkg.json
#[derive(Parser)]
#[command(name = "pkg")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Stream build output and enable debug logs
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch all dependencies into vendor/src and print the dependency tree
  Fetch {
    #[command(flatten)]
    resolve: ResolveArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Fetch all dependencies, then build them in dependency order
  Install {
    #[command(flatten)]
    resolve: ResolveArgs,

    /// Write the build instructions to a shell script instead of running them
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Shell used to run build instructions
    #[arg(long)]
    shell: Option<String>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Fetch { resolve, output } => cmd::cmd_fetch(&resolve, output),
    Commands::Install { resolve, script, shell } => cmd::cmd_install(&resolve, script.as_deref(), shell, cli.verbose),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
