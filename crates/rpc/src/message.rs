//! Wire envelope shared by both directions of a channel.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Correlation id, unique among one sender's in-flight requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Simple counter-based id generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterIdGen(pub u64);

impl CounterIdGen {
	/// Creates a new counter starting at 0.
	#[must_use]
	pub const fn new() -> Self {
		Self(0)
	}

	/// Generates the next id and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> RequestId {
		let id = RequestId(self.0);
		self.0 += 1;
		id
	}
}

/// A request or a response, tagged with `"kind"`.
///
/// ```json
/// { "kind": "request",  "id": 3, "body": { ... } }
/// { "kind": "response", "id": 3, "body": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Message<Req, Resp> {
	/// A request expecting exactly one response with the same id.
	Request {
		/// Sender-assigned correlation id.
		id: RequestId,
		/// Request payload.
		body: Req,
	},
	/// The response to the remote request with the same id.
	Response {
		/// Echoed correlation id.
		id: RequestId,
		/// Response payload.
		body: Resp,
	},
}

impl<Req, Resp> Message<Req, Resp> {
	/// Returns the correlation id.
	pub fn id(&self) -> RequestId {
		match self {
			Self::Request { id, .. } | Self::Response { id, .. } => *id,
		}
	}
}

impl<Req: Serialize, Resp: Serialize> Message<Req, Resp> {
	/// Encodes the message as JSON text.
	///
	/// # Errors
	///
	/// Returns [`Error::Encode`] if a body fails to serialize.
	pub fn encode(&self) -> Result<String> {
		serde_json::to_string(self).map_err(Error::Encode)
	}
}

impl<Req: DeserializeOwned, Resp: DeserializeOwned> Message<Req, Resp> {
	/// Decodes a message from JSON text.
	///
	/// # Errors
	///
	/// Returns [`Error::Decode`] if the frame is not a valid envelope.
	pub fn decode(frame: &str) -> Result<Self> {
		serde_json::from_str(frame).map_err(Error::Decode)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn ids_are_sequential() {
		let mut ids = CounterIdGen::new();
		assert_eq!(ids.next(), RequestId(0));
		assert_eq!(ids.next(), RequestId(1));
	}

	#[test]
	fn envelope_is_kind_tagged() {
		let msg: Message<serde_json::Value, serde_json::Value> = Message::Request {
			id: RequestId(7),
			body: json!({ "kind": "start", "patch": 0 }),
		};
		let encoded = msg.encode().unwrap();
		let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
		assert_eq!(
			value,
			json!({ "kind": "request", "id": 7, "body": { "kind": "start", "patch": 0 } })
		);
		assert_eq!(Message::decode(&encoded).unwrap(), msg);
	}

	#[test]
	fn decode_rejects_unknown_kind() {
		let err = Message::<serde_json::Value, serde_json::Value>::decode(
			r#"{"kind":"notify","id":1,"body":{}}"#,
		)
		.unwrap_err();
		assert!(matches!(err, Error::Decode(_)));
	}
}
