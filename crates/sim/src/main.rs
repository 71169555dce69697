//! Tandem scenario runner.
//!
//! Replays scripted host and peer edits through an in-memory sync session
//! and checks that both replicas end up with the same text.

mod cli;
mod replay;
mod scenario;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{Cli, Command};
use scenario::Scenario;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	match cli.command {
		Command::Replay { path, verbose } => {
			setup_tracing(verbose);
			let mut scenario =
				Scenario::load(&path).with_context(|| format!("loading {}", path.display()))?;
			if verbose {
				scenario.sync.log_messages = true;
			}

			let outcome = replay::run(&scenario).await?;
			println!("host (version {}): {:?}", outcome.version, outcome.host);
			println!("peer: {:?}", outcome.peer);
			if !outcome.converged() {
				bail!("replicas diverged");
			}
			println!("converged");
		}
		Command::Check { path } => {
			let scenario =
				Scenario::load(&path).with_context(|| format!("loading {}", path.display()))?;
			println!("{}: {} steps", path.display(), scenario.steps.len());
		}
	}

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("tandem_rpc=trace,tandem_sync=debug,tandem_sim=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(verbose)
		.init();
}
