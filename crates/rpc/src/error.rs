//! Error types for the message channel.

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible channel errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The endpoint was closed; nothing more is sent or resolved.
	#[error("endpoint closed")]
	Closed,
	/// The pending continuation was dropped before a response arrived.
	#[error("request canceled before a response arrived")]
	Canceled,
	/// A message could not be serialized.
	#[error("failed to encode message: {0}")]
	Encode(#[source] serde_json::Error),
	/// An inbound frame or response body could not be deserialized.
	#[error("failed to decode message: {0}")]
	Decode(#[source] serde_json::Error),
}
