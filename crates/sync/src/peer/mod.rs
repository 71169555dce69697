//! Peer-side synchronization: the detached replica.
//!
//! [`PeerSync`] numbers every local edit as a patch and records its lineage,
//! reconstructs every pushed host version, and resets the editor whenever a
//! host version is not known to equal one of its own patches.

use std::collections::{BTreeMap, HashMap};

use tandem_text::{Diff, Doc};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{
	Lineage, PATCH_ORIGIN, Patch, PatchRequest, StartRequest, StartResponse, Version, VersionRequest,
	VersionResponse,
};

mod driver;

pub use driver::{PeerExit, PeerLoop};

/// Answer to a host version push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReply {
	/// Response for the host.
	pub response: VersionResponse,
	/// Text the editor must be reset to, for untagged pushes.
	pub reset: Option<String>,
}

/// A replica seeded from the host.
#[derive(Debug, Clone)]
pub struct Replica {
	/// Current patch number.
	patch: Patch,
	doc: Doc,
	/// Reconstructed host versions still reachable by a push.
	versions: BTreeMap<Version, Doc>,
	/// Lineage of patch `p` at index `p - 1`.
	lineage: Vec<Lineage>,
	version_patches: HashMap<Version, Patch>,
}

impl Replica {
	fn seed(resp: StartResponse) -> Self {
		let doc = Doc::new(&resp.text);
		Self {
			patch: PATCH_ORIGIN,
			versions: BTreeMap::from([(resp.version, doc.clone())]),
			doc,
			lineage: Vec::new(),
			version_patches: HashMap::from([(resp.version, PATCH_ORIGIN)]),
		}
	}

	fn next_patch(&mut self, diff: Diff) -> Patch {
		let prior = self.patch;
		self.lineage.push(Lineage { prior, diff });
		self.patch = self.lineage.len() as Patch;
		self.patch
	}
}

/// Peer synchronization state.
#[derive(Debug, Clone, Default)]
pub enum PeerSync {
	/// Waiting for the start response.
	#[default]
	Uninitialized,
	/// Holding a replica seeded from the host.
	Synchronized(Replica),
}

impl PeerSync {
	/// Creates a peer awaiting its start response.
	pub fn new() -> Self {
		Self::Uninitialized
	}

	/// Returns true once the start response has been handled.
	pub fn is_synchronized(&self) -> bool {
		matches!(self, Self::Synchronized(_))
	}

	/// Builds the handshake request, pre-allocating the origin patch.
	pub fn start_request(&self) -> StartRequest {
		StartRequest { patch: PATCH_ORIGIN }
	}

	/// Seeds the replica from the host's full state.
	///
	/// Calling this again discards everything and re-seeds.
	pub fn on_start(&mut self, resp: StartResponse) {
		info!(version = resp.version, len = resp.text.len(), "peer synchronized");
		*self = Self::Synchronized(Replica::seed(resp));
	}

	/// Records a local edit and builds the patch request for the host.
	///
	/// Returns `None` if the edit leaves the text unchanged.
	///
	/// # Errors
	///
	/// Returns [`Error::NotStarted`] before the start response and
	/// [`Error::Diff`] if the diff does not apply to the replica.
	pub fn on_local_edit(&mut self, diff: Diff) -> Result<Option<PatchRequest>> {
		let replica = self.replica_mut()?;
		let doc = replica.doc.edit(&diff)?;
		if doc == replica.doc {
			debug!(patch = replica.patch, "local edit left text unchanged");
			return Ok(None);
		}
		replica.doc = doc;
		let prior = replica.patch;
		let patch = replica.next_patch(diff.clone());
		debug!(prior, patch, "local edit");
		Ok(Some(PatchRequest { prior, patch, diff }))
	}

	/// Reconstructs a pushed host version and decides whether the editor must reset.
	///
	/// A push tagged with a patch is already reflected in the replica. An
	/// untagged push allocates a new patch that replaces the whole text, and
	/// the editor is reset to the host version.
	///
	/// # Errors
	///
	/// Returns [`Error::NotStarted`] before the start response,
	/// [`Error::UnknownVersion`] if `previous` was never seen or already
	/// pruned, and [`Error::Diff`] if the diff does not apply to it. No state
	/// changes in either case.
	pub fn on_version(&mut self, req: VersionRequest) -> Result<PeerReply> {
		let replica = self.replica_mut()?;
		let previous = replica
			.versions
			.get(&req.previous)
			.ok_or(Error::UnknownVersion(req.previous))?;
		let doc = previous.edit(&req.diff)?;

		// Older versions can no longer be the base of a push.
		replica.versions = replica.versions.split_off(&req.previous);
		replica.version_patches.retain(|&version, _| version >= req.previous);
		replica.versions.insert(req.version, doc.clone());

		if let Some(patch) = req.patch {
			debug!(version = req.version, patch, "host version matches local patch");
			replica.version_patches.insert(req.version, patch);
			return Ok(PeerReply {
				response: VersionResponse { patch },
				reset: None,
			});
		}

		let replace = replica.doc.replace_all(doc.to_string());
		let patch = replica.next_patch(replace);
		info!(version = req.version, patch, "resetting to host version");
		replica.version_patches.insert(req.version, patch);
		let text = doc.to_string();
		replica.doc = doc;
		Ok(PeerReply {
			response: VersionResponse { patch },
			reset: Some(text),
		})
	}

	/// Returns the current patch number.
	pub fn patch(&self) -> Option<Patch> {
		self.replica().map(|r| r.patch)
	}

	/// Returns the replica text.
	pub fn doc(&self) -> Option<&Doc> {
		self.replica().map(|r| &r.doc)
	}

	/// Returns the lineage recorded for `patch`.
	pub fn lineage(&self, patch: Patch) -> Option<&Lineage> {
		let index = usize::try_from(patch.checked_sub(1)?).ok()?;
		self.replica()?.lineage.get(index)
	}

	/// Returns the patch known to equal host `version`.
	pub fn patch_of(&self, version: Version) -> Option<Patch> {
		self.replica()?.version_patches.get(&version).copied()
	}

	/// Returns the reconstructed host version, if it has not been pruned.
	pub fn version(&self, version: Version) -> Option<&Doc> {
		self.replica()?.versions.get(&version)
	}

	/// Rebuilds the diff from the origin patch to `patch`.
	pub fn diff_from_origin(&self, mut patch: Patch) -> Option<Diff> {
		let mut diffs = Vec::new();
		while patch != PATCH_ORIGIN {
			let lineage = self.lineage(patch)?;
			diffs.push(lineage.diff.clone());
			patch = lineage.prior;
		}
		Some(Diff::flatten(diffs.into_iter().rev()))
	}

	fn replica(&self) -> Option<&Replica> {
		match self {
			Self::Synchronized(replica) => Some(replica),
			Self::Uninitialized => None,
		}
	}

	fn replica_mut(&mut self) -> Result<&mut Replica> {
		match self {
			Self::Synchronized(replica) => Ok(replica),
			Self::Uninitialized => Err(Error::NotStarted),
		}
	}
}
