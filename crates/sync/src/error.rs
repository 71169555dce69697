//! Error types for the sync controllers and their configuration.

use std::path::PathBuf;

use tandem_text::DiffError;

use crate::protocol::Version;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the sync controllers and their drivers.
///
/// None of these are fatal to a session; drivers log them and carry on.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The peer has not received its start response yet.
	#[error("peer has not completed the start handshake")]
	NotStarted,
	/// A host version update refers to a version the peer never saw.
	#[error("unknown host version {0}")]
	UnknownVersion(Version),
	/// A host change notification skipped versions.
	#[error("host change from version {got} does not follow mirrored version {expected}")]
	VersionGap {
		/// Version the mirror is at.
		expected: Version,
		/// Version the change claims to start from.
		got: Version,
	},
	/// A diff did not apply to the snapshot it was meant for.
	#[error(transparent)]
	Diff(#[from] DiffError),
	/// Channel failure.
	#[error(transparent)]
	Rpc(#[from] tandem_rpc::Error),
	/// A sync task panicked or was aborted.
	#[error("sync task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

/// Errors raised while loading [`SyncConfig`](crate::SyncConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The configuration file could not be read.
	#[error("failed to read {path}: {source}")]
	Io {
		/// File that failed to load.
		path: PathBuf,
		/// Underlying IO error.
		#[source]
		source: std::io::Error,
	},
	/// The configuration is not valid TOML for this schema.
	#[error("invalid sync configuration: {0}")]
	Parse(#[from] toml::de::Error),
	/// A value is out of range.
	#[error("invalid sync configuration: {0}")]
	Invalid(String),
}
