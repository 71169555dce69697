//! Request and response bodies exchanged by the host and the peer.
//!
//! Requests carry a `"kind"` tag. Responses are untagged; the requester knows
//! which shape to expect from the request it sent.

use serde::{Deserialize, Serialize};
use tandem_text::Diff;

/// Host-side document version.
pub type Version = u64;

/// Peer-side document patch number.
pub type Patch = u64;

/// Patch number the peer pre-allocates for its initial document.
pub const PATCH_ORIGIN: Patch = 0;

/// Host to peer: the host document has a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRequest {
	/// Version the diff applies to.
	pub previous: Version,
	/// New version number.
	pub version: Version,
	/// Peer patch this version is known to equal, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub patch: Option<Patch>,
	/// Changes turning `previous` into `version`.
	pub diff: Diff,
}

/// Peer responding to a [`VersionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
	/// Patch now known to equal the pushed version.
	pub patch: Patch,
}

/// Peer to host: the peer has (re)started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
	/// Patch number pre-allocated for the initial document.
	pub patch: Patch,
}

/// Host responding to a [`StartRequest`] with its full state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
	/// Current host version.
	pub version: Version,
	/// Current host text.
	pub text: String,
}

/// Peer to host: a local edit on top of a prior patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRequest {
	/// Patch the diff applies to.
	pub prior: Patch,
	/// New patch number.
	pub patch: Patch,
	/// Changes turning `prior` into `patch`.
	pub diff: Diff,
}

/// Host acknowledging a [`PatchRequest`]; carries no content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchResponse {}

/// Requests sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HostRequest {
	/// See [`VersionRequest`].
	Version(VersionRequest),
}

/// Requests sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PeerRequest {
	/// See [`StartRequest`].
	Start(StartRequest),
	/// See [`PatchRequest`].
	Patch(PatchRequest),
}

/// Responses sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HostResponse {
	/// Answer to [`PeerRequest::Start`].
	Start(StartResponse),
	/// Answer to [`PeerRequest::Patch`].
	Patch(PatchResponse),
}

/// Responses sent by the peer.
pub type PeerResponse = VersionResponse;

/// How one peer patch derives from an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
	/// Patch the diff applies to.
	pub prior: Patch,
	/// Changes turning `prior` into the patch this record belongs to.
	pub diff: Diff,
}
