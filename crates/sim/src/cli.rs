use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(about = "Replay host/peer edit scenarios through a sync session")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run a scenario and report whether both replicas converged
	Replay {
		/// Scenario file (TOML)
		path: PathBuf,

		/// Verbose logging, including every frame on the link
		#[arg(short, long)]
		verbose: bool,
	},
	/// Parse and validate a scenario without running it
	Check {
		/// Scenario file (TOML)
		path: PathBuf,
	},
}
