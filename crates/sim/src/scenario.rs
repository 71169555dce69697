//! Scenario files.
//!
//! ```toml
//! version = 5
//! text = "hello"
//!
//! [sync]
//! log_messages = true
//!
//! [[step]]
//! peer = { start = 5, end = 5, text = "!" }
//!
//! [[step]]
//! settle = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tandem_sync::protocol::Version;
use tandem_sync::{ConfigError, SyncConfig};
use tandem_text::Replace;

/// Errors raised while loading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
	/// The scenario file could not be read.
	#[error("failed to read {path}: {source}")]
	Io {
		/// Scenario path.
		path: PathBuf,
		/// Underlying IO error.
		#[source]
		source: std::io::Error,
	},
	/// The file is not a valid scenario.
	#[error("invalid scenario: {0}")]
	Parse(#[from] toml::de::Error),
	/// The embedded sync configuration is out of range.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// A host document, its initial state, and the edits to play against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
	/// Initial host version.
	#[serde(default)]
	pub version: Version,
	/// Initial host text.
	#[serde(default)]
	pub text: String,
	/// Session configuration.
	#[serde(default)]
	pub sync: SyncConfig,
	/// Steps, in order.
	#[serde(default, rename = "step")]
	pub steps: Vec<Step>,
}

/// One scenario action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawStep")]
pub enum Step {
	/// Edit the host document as one of its users.
	Host(Replace),
	/// Type into the peer editor.
	Peer(Replace),
	/// Let both sides handle everything in flight.
	Settle,
	/// Replace the peer with a fresh one.
	RestartPeer,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
	host: Option<Replace>,
	peer: Option<Replace>,
	#[serde(default)]
	settle: bool,
	#[serde(default)]
	restart_peer: bool,
}

impl TryFrom<RawStep> for Step {
	type Error = String;

	fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
		let mut actions = Vec::new();
		if let Some(change) = raw.host {
			actions.push(Step::Host(change));
		}
		if let Some(change) = raw.peer {
			actions.push(Step::Peer(change));
		}
		if raw.settle {
			actions.push(Step::Settle);
		}
		if raw.restart_peer {
			actions.push(Step::RestartPeer);
		}
		match actions.len() {
			1 => Ok(actions.remove(0)),
			0 => Err("step has no action".into()),
			n => Err(format!("step has {n} actions, expected exactly one")),
		}
	}
}

impl Scenario {
	/// Parses a scenario from TOML text.
	///
	/// # Errors
	///
	/// Returns [`ScenarioError::Parse`] for malformed scenarios and
	/// [`ScenarioError::Config`] for an out-of-range `[sync]` table.
	pub fn parse(text: &str) -> Result<Self, ScenarioError> {
		let scenario: Self = toml::from_str(text)?;
		scenario.sync.validate()?;
		Ok(scenario)
	}

	/// Loads a scenario file.
	///
	/// # Errors
	///
	/// Returns [`ScenarioError::Io`] if the file cannot be read, otherwise the
	/// errors of [`Scenario::parse`].
	pub fn load(path: &Path) -> Result<Self, ScenarioError> {
		let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(&text)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_steps_in_order() {
		let scenario = Scenario::parse(
			r#"
			version = 2
			text = "ab"

			[sync]
			max_pending_requests = 8

			[[step]]
			host = { start = 0, end = 1, text = "A" }

			[[step]]
			peer = { start = 2, end = 2, text = "c" }

			[[step]]
			settle = true

			[[step]]
			restart_peer = true
			"#,
		)
		.unwrap();

		assert_eq!(scenario.version, 2);
		assert_eq!(scenario.text, "ab");
		assert_eq!(scenario.sync.max_pending_requests, 8);
		assert_eq!(
			scenario.steps,
			vec![
				Step::Host(Replace::new(0, 1, "A")),
				Step::Peer(Replace::insert(2, "c")),
				Step::Settle,
				Step::RestartPeer,
			]
		);
	}

	#[test]
	fn defaults_to_empty_document() {
		let scenario = Scenario::parse("").unwrap();
		assert_eq!(scenario.version, 0);
		assert_eq!(scenario.text, "");
		assert_eq!(scenario.sync, SyncConfig::default());
		assert!(scenario.steps.is_empty());
	}

	#[test]
	fn step_needs_exactly_one_action() {
		let none = Scenario::parse("[[step]]\nsettle = false\n").unwrap_err();
		assert!(none.to_string().contains("no action"), "{none}");

		let two = Scenario::parse("[[step]]\nsettle = true\nrestart_peer = true\n").unwrap_err();
		assert!(two.to_string().contains("2 actions"), "{two}");
	}

	#[test]
	fn rejects_invalid_sync_table() {
		assert!(matches!(
			Scenario::parse("[sync]\nmax_pending_requests = 0\n"),
			Err(ScenarioError::Config(_))
		));
		assert!(matches!(
			Scenario::parse("[sync]\nretries = 1\n"),
			Err(ScenarioError::Parse(_))
		));
	}

	#[test]
	fn loads_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "text = \"x\"\n[[step]]\nsettle = true").unwrap();
		let scenario = Scenario::load(file.path()).unwrap();
		assert_eq!(scenario.steps, vec![Step::Settle]);
	}

	#[test]
	fn shipped_scenarios_parse() {
		for text in [
			include_str!("../scenarios/echo.toml"),
			include_str!("../scenarios/conflict.toml"),
			include_str!("../scenarios/restart.toml"),
		] {
			Scenario::parse(text).unwrap();
		}
	}
}
