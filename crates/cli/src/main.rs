use clap::{Parser, Subcommand};
use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

mod cmd;
mod reporter;

#[derive(Parser)]
#[command(name = "remote-ci")]
#[command(version, about = "Run a fixed test sequence on an ephemeral VM")]
pub struct Cli {
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
  /// Provision a VM, synchronize the checkout and run every test step
  Run {
    #[arg(short, long)]
    config: PathBuf,

    /// Ref that triggered the run. Empty or missing means the default ref
    #[arg(long = "ref", env = "GITHUB_HEAD_REF")]
    reference: Option<String>,

    /// Write the run result as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Keep the VM after the run
    #[arg(long)]
    no_teardown: bool,

    /// Run the script with a local shell from this directory instead of a VM
    #[arg(long)]
    local: Option<PathBuf>,
  },
  /// Validate the config and print the plan without side effects
  Check {
    #[arg(short, long)]
    config: PathBuf,

    #[arg(long = "ref", env = "GITHUB_HEAD_REF")]
    reference: Option<String>,
  },
}

/// Loads `.env` (or `env_file`) first so `env = ...` arguments see its values.
fn parse_cli<I, T>(env_file: Option<&Path>, args: I) -> clap::error::Result<Cli>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString> + Clone,
{
  match env_file {
    Some(path) => {
      dotenv::from_path(path).ok();
    }
    None => {
      dotenv::dotenv().ok();
    }
  }

  Cli::try_parse_from(args)
}

#[tokio::main]
async fn main() {
  let cli = parse_cli(None, std::env::args_os()).unwrap_or_else(|err| err.exit());

  remote_ci_logger::init_logger_with_level(if cli.verbose {
    log::Level::Trace
  } else {
    log::Level::Info
  });

  let res = match cli.command {
    Commands::Run {
      config,
      reference,
      report,
      no_teardown,
      local,
    } => {
      cmd::run(cmd::RunArgs {
        config,
        reference,
        report,
        no_teardown,
        local,
      })
      .await
    }
    Commands::Check { config, reference } => cmd::check(&config, reference),
  };

  if let Err(err) = res {
    log::error!("{:#}", err);
    std::process::exit(1);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_env_file_feeds_ref_argument() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join(".env");
    std::fs::write(&env_file, "GITHUB_HEAD_REF=feature-from-env-file\n").unwrap();
    std::env::remove_var("GITHUB_HEAD_REF");

    let cli = parse_cli(Some(&env_file), ["remote-ci", "check", "-c", "ci.yml"]).unwrap();

    match cli.command {
      Commands::Check { reference, .. } => {
        assert_eq!(reference.as_deref(), Some("feature-from-env-file"))
      }
      _ => panic!("expected the check command"),
    }
  }
}
