//! Runs a scenario through an in-memory session.

use tandem_sync::protocol::Version;
use tandem_sync::{HostDocument, HostSync, MemoryDocument, MemoryEditor, Session};
use tracing::{info, warn};

use crate::scenario::{Scenario, Step};

/// Final state of both replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
	/// Host document text.
	pub host: String,
	/// Host document version.
	pub version: Version,
	/// Peer editor text.
	pub peer: String,
}

impl Outcome {
	/// Returns true if both replicas hold the same text.
	pub fn converged(&self) -> bool {
		self.host == self.peer
	}
}

/// Plays every step, settles, and reports both texts.
///
/// Edits that do not apply to the text they are typed into are skipped
/// with a warning.
///
/// # Errors
///
/// Fails if a sync task panics.
pub async fn run(scenario: &Scenario) -> anyhow::Result<Outcome> {
	let (document, changes) = MemoryDocument::new(scenario.version, &scenario.text);
	let (editor, edits) = MemoryEditor::new();
	let mut session = Session::spawn(
		HostSync::new(scenario.version, &scenario.text),
		document.clone(),
		changes,
		editor.clone(),
		edits,
		&scenario.sync,
	);
	session.settle().await;

	for (index, step) in scenario.steps.iter().enumerate() {
		match step {
			Step::Host(change) => {
				if !document.edit(change.clone()) {
					warn!(step = index, ?change, "host edit skipped");
				}
			}
			Step::Peer(change) => {
				if !editor.edit(change.clone()) {
					warn!(step = index, ?change, "peer edit skipped");
				}
			}
			Step::Settle => session.settle().await,
			Step::RestartPeer => {
				info!(step = index, "restarting peer");
				session.restart_peer().await?;
			}
		}
	}
	session.settle().await;

	let outcome = Outcome {
		host: document.text(),
		version: document.version(),
		peer: editor.text(),
	};
	session.close().await?;
	Ok(outcome)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	async fn replay(text: &str) -> Outcome {
		run(&Scenario::parse(text).unwrap()).await.unwrap()
	}

	#[tokio::test(flavor = "current_thread")]
	async fn echo_scenario_converges() {
		let outcome = replay(include_str!("../scenarios/echo.toml")).await;
		assert_eq!(
			outcome,
			Outcome {
				host: "hello!".into(),
				version: 6,
				peer: "hello!".into(),
			}
		);
	}

	#[tokio::test(flavor = "current_thread")]
	async fn conflict_scenario_keeps_host_edit() {
		let outcome = replay(include_str!("../scenarios/conflict.toml")).await;
		assert_eq!(outcome.host, "hello world");
		assert!(outcome.converged());
	}

	#[tokio::test(flavor = "current_thread")]
	async fn restart_scenario_converges() {
		let outcome = replay(include_str!("../scenarios/restart.toml")).await;
		assert_eq!(outcome.host, "one two three");
		assert!(outcome.converged());
	}

	#[tokio::test(flavor = "current_thread")]
	async fn unsettled_scenario_still_settles_at_end() {
		let outcome = replay(
			r#"
			text = "ab"
			[[step]]
			peer = { start = 2, end = 2, text = "c" }
			[[step]]
			peer = { start = 3, end = 3, text = "d" }
			"#,
		)
		.await;
		assert_eq!(outcome.host, "abcd");
		assert!(outcome.converged());
	}

	#[tokio::test(flavor = "current_thread")]
	async fn inapplicable_edit_is_skipped() {
		let outcome = replay(
			r#"
			text = "ab"
			[[step]]
			host = { start = 1, end = 9, text = "" }
			"#,
		)
		.await;
		assert_eq!(outcome.host, "ab");
		assert_eq!(outcome.version, 0);
	}
}
