use std::path::PathBuf;

use clap::{
  ArgAction,
  Parser,
  Subcommand,
};

#[derive(Debug, Parser)]
#[command(name = "the-hooks")]
#[command(about = "Replay page hook sessions against an in-memory page")]
pub struct Cli {
  /// Raise log verbosity (-v for debug, -vv for trace)
  #[arg(short, long, action = ArgAction::Count, global = true)]
  pub verbose: u8,

  /// Config file to use in place of the global one
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Run a scenario file and print a JSON report
  Replay {
    scenario: PathBuf,

    /// Print the report on a single line
    #[arg(long)]
    compact: bool,
  },
  /// Print the effective configuration as TOML
  Config,
}
