//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tandem_rpc::DEFAULT_MAX_PENDING;

use crate::error::ConfigError;

/// Tunables shared by both sides of a session.
///
/// ```toml
/// max_pending_requests = 256
/// log_messages = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
	/// Bound on unanswered outgoing requests per side.
	pub max_pending_requests: usize,
	/// Trace every frame posted or received.
	pub log_messages: bool,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			max_pending_requests: DEFAULT_MAX_PENDING,
			log_messages: false,
		}
	}
}

impl SyncConfig {
	/// Parses a configuration from TOML text.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
	/// [`ConfigError::Invalid`] for out-of-range values.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads a configuration file.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
	/// errors of [`SyncConfig::from_toml_str`].
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&text)
	}

	/// Checks value ranges.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Invalid`] if `max_pending_requests` is zero.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_pending_requests == 0 {
			return Err(ConfigError::Invalid(
				"max_pending_requests must be at least 1".into(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_config_uses_defaults() {
		assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
	}

	#[test]
	fn parses_all_fields() {
		let config = SyncConfig::from_toml_str("max_pending_requests = 8\nlog_messages = true\n").unwrap();
		assert_eq!(
			config,
			SyncConfig {
				max_pending_requests: 8,
				log_messages: true,
			}
		);
	}

	#[test]
	fn rejects_unknown_keys() {
		assert!(matches!(
			SyncConfig::from_toml_str("retries = 3"),
			Err(ConfigError::Parse(_))
		));
	}

	#[test]
	fn rejects_zero_pending_bound() {
		assert!(matches!(
			SyncConfig::from_toml_str("max_pending_requests = 0"),
			Err(ConfigError::Invalid(_))
		));
	}

	#[test]
	fn loads_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "log_messages = true").unwrap();
		let config = SyncConfig::load(file.path()).unwrap();
		assert!(config.log_messages);
		assert_eq!(config.max_pending_requests, DEFAULT_MAX_PENDING);
	}

	#[test]
	fn missing_file_reports_path() {
		let err = SyncConfig::load("/nonexistent/tandem.toml").unwrap_err();
		assert!(err.to_string().contains("/nonexistent/tandem.toml"));
	}
}
