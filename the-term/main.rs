//! `the-hooks`: replays scripted sessions against the hook runtime.
//!
//! A scenario describes the initial page and a list of steps (mounting,
//! typing, server pushes, theme switches, attribute writes, keys, window
//! events, removals). The report lists what every editor and chart ended up
//! showing and every event sent toward the server.

mod cli;
mod replay;
mod scenario;

use std::{
  fs,
  path::Path,
};

use clap::Parser;
use eyre::{
  Result,
  WrapErr,
};
use the_hooks_config::{
  Config,
  ConfigLoadError,
  local_config_file,
};
use tracing_subscriber::EnvFilter;

use crate::{
  cli::{
    Cli,
    Command,
  },
  scenario::Scenario,
};

const LOG_ENV: &str = "THE_HOOKS_LOG";

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let config = load_config(cli.config.as_deref())?;
  match cli.command {
    Command::Replay { scenario, compact } => {
      let source = fs::read_to_string(&scenario)
        .wrap_err_with(|| format!("failed to read scenario {}", scenario.display()))?;
      let scenario: Scenario = toml::from_str(&source)
        .wrap_err_with(|| format!("invalid scenario {}", scenario.display()))?;
      let report = replay::run(&scenario, &config)?;
      let json = if compact {
        serde_json::to_string(&report)?
      } else {
        serde_json::to_string_pretty(&report)?
      };
      println!("{json}");
    },
    Command::Config => {
      print!("{}", toml::to_string_pretty(&config)?);
    },
  }
  Ok(())
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

/// An explicit config file must exist; the default locations may not.
fn load_config(global: Option<&Path>) -> Result<Config> {
  let config = match global {
    Some(path) => {
      let global = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
      let local = fs::read_to_string(local_config_file()).map_err(ConfigLoadError::Error);
      Config::load(Ok(global), local)
    },
    None => Config::load_user(),
  };
  config.wrap_err("failed to load configuration")
}
