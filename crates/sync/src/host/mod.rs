//! Host-side synchronization: the authoritative document.
//!
//! [`HostSync`] mirrors the host document, pushes every host version to the
//! peer, and reconciles peer patches against the current version. Host edits
//! always win: a peer proposal rooted at an older version is dropped whole.
//!
//! At most one reconciled edit is in flight against the host document. Peer
//! patches arriving meanwhile only replace the waiting proposal; when the
//! in-flight edit completes, the newest proposal is reconciled, covering every
//! patch in between with one composed diff.

use std::collections::HashMap;

use tandem_text::{Diff, Doc};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
	HostResponse, Lineage, Patch, PatchRequest, PatchResponse, PeerRequest, StartRequest,
	StartResponse, Version, VersionRequest, VersionResponse,
};

mod driver;

pub use driver::HostLoop;

/// A host document change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostChange {
	/// Version before the change.
	pub previous: Version,
	/// Version after the change.
	pub version: Version,
	/// Content changes turning `previous` into `version`.
	pub diff: Diff,
}

/// Peer proposal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
	/// No peer proposal is pending.
	Idle,
	/// The most recent unresolved peer proposal.
	Reconciling(Patch),
}

/// A composed peer edit to apply to the host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
	/// Patch the edit brings the host document to.
	pub patch: Patch,
	/// Root-to-leaf composition of the lineage diffs.
	pub diff: Diff,
}

/// Outcome of a host document change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUpdate {
	/// Version push for the peer.
	pub push: VersionRequest,
	/// Edit to apply to the host document next, if any.
	pub proposal: Option<Proposal>,
}

/// The edit currently submitted to the host document.
#[derive(Debug, Clone)]
struct Applying {
	/// `None` once the peer that proposed it has restarted.
	patch: Option<Patch>,
	/// Document the edit is expected to produce.
	expected: Doc,
	/// Whether the matching change notification has been seen.
	echoed: bool,
}

enum Walk {
	Root {
		root: Patch,
		version: Version,
		/// Leaf-to-root order.
		diffs: Vec<Diff>,
	},
	Broken {
		missing: Patch,
	},
}

/// Host synchronization state.
#[derive(Debug)]
pub struct HostSync {
	version: Version,
	doc: Doc,
	/// Incremented whenever the peer restarts.
	generation: u64,
	patches: HashMap<Patch, Lineage>,
	version_patches: HashMap<Patch, Version>,
	reconciliation: Reconciliation,
	in_flight: Option<Applying>,
}

impl HostSync {
	/// Creates the host state for a document at `version`.
	pub fn new(version: Version, text: &str) -> Self {
		Self {
			version,
			doc: Doc::new(text),
			generation: 0,
			patches: HashMap::new(),
			version_patches: HashMap::new(),
			reconciliation: Reconciliation::Idle,
			in_flight: None,
		}
	}

	/// Returns the mirrored host version.
	pub fn version(&self) -> Version {
		self.version
	}

	/// Returns the mirrored host document.
	pub fn doc(&self) -> &Doc {
		&self.doc
	}

	/// Returns the current peer generation.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns the proposal state.
	pub fn reconciliation(&self) -> Reconciliation {
		self.reconciliation
	}

	/// Returns true while a reconciled edit is in flight.
	pub fn is_applying(&self) -> bool {
		self.in_flight.is_some()
	}

	/// Returns the host version known to equal `patch`.
	pub fn version_of(&self, patch: Patch) -> Option<Version> {
		self.version_patches.get(&patch).copied()
	}

	/// Returns the lineage recorded for `patch`.
	pub fn lineage(&self, patch: Patch) -> Option<&Lineage> {
		self.patches.get(&patch)
	}

	/// Answers one peer request.
	pub fn on_request(&mut self, request: PeerRequest) -> (HostResponse, Option<Proposal>) {
		match request {
			PeerRequest::Start(req) => (HostResponse::Start(self.on_start(req)), None),
			PeerRequest::Patch(req) => {
				let (ack, proposal) = self.on_patch(req);
				(HostResponse::Patch(ack), proposal)
			}
		}
	}

	/// Handles a peer (re)start.
	///
	/// Everything learned about the previous peer is discarded. An edit still
	/// in flight is kept but its echo will no longer be tagged.
	pub fn on_start(&mut self, req: StartRequest) -> StartResponse {
		info!(patch = req.patch, version = self.version, "peer started");
		self.generation += 1;
		self.patches.clear();
		self.version_patches.clear();
		self.version_patches.insert(req.patch, self.version);
		self.reconciliation = Reconciliation::Idle;
		if let Some(applying) = self.in_flight.as_mut() {
			applying.patch = None;
		}
		StartResponse {
			version: self.version,
			text: self.doc.to_string(),
		}
	}

	/// Records a peer patch and acknowledges it.
	///
	/// The patch becomes the waiting proposal, superseding any older one. It
	/// is reconciled right away unless an edit is already in flight.
	pub fn on_patch(&mut self, req: PatchRequest) -> (PatchResponse, Option<Proposal>) {
		debug!(prior = req.prior, patch = req.patch, "peer patch received");
		self.patches.insert(
			req.patch,
			Lineage {
				prior: req.prior,
				diff: req.diff,
			},
		);
		self.reconciliation = Reconciliation::Reconciling(req.patch);
		let proposal = if self.in_flight.is_none() { self.propose() } else { None };
		(PatchResponse {}, proposal)
	}

	/// Mirrors a host document change and builds the push for the peer.
	///
	/// If the change is the echo of the edit in flight, the push is tagged
	/// with the patch it equals so the peer leaves its editor alone.
	///
	/// # Errors
	///
	/// Returns [`Error::VersionGap`] or [`Error::Diff`] when the mirror can no
	/// longer follow the host document; recover with [`HostSync::resync`].
	pub fn on_local_edit(&mut self, change: HostChange) -> Result<HostUpdate> {
		if change.previous != self.version {
			return Err(Error::VersionGap {
				expected: self.version,
				got: change.previous,
			});
		}
		self.doc = self.doc.edit(&change.diff)?;
		self.version = change.version;

		let echo = match self.in_flight.as_mut() {
			Some(applying) if !applying.echoed && applying.expected == self.doc => {
				applying.echoed = true;
				applying.patch
			}
			_ => None,
		};
		if let Some(patch) = echo {
			debug!(patch, version = self.version, "host version echoes peer patch");
			self.version_patches.insert(patch, self.version);
		}

		let push = VersionRequest {
			previous: change.previous,
			version: change.version,
			patch: echo,
			diff: change.diff,
		};
		let proposal = if self.in_flight.is_none() { self.propose() } else { None };
		Ok(HostUpdate { push, proposal })
	}

	/// Replaces the mirror with the host document's full text.
	///
	/// The push replaces the whole previous text, which makes the peer reset.
	pub fn resync(&mut self, version: Version, text: &str) -> HostUpdate {
		warn!(from = self.version, to = version, "resynchronizing host mirror");
		let previous = self.version;
		let diff = self.doc.replace_all(text);
		self.doc = Doc::new(text);
		self.version = version;
		HostUpdate {
			push: VersionRequest {
				previous,
				version,
				patch: None,
				diff,
			},
			proposal: None,
		}
	}

	/// Completes the edit in flight.
	///
	/// A rejected edit is not retried and clears the waiting proposal. After
	/// a successful edit, a proposal that superseded it is reconciled now.
	pub fn on_applied(&mut self, applied: bool) -> Option<Proposal> {
		let Some(applying) = self.in_flight.take() else {
			warn!("edit completion with nothing in flight");
			return None;
		};

		if !applied {
			warn!(patch = ?applying.patch, "host document rejected peer edit");
			self.reconciliation = Reconciliation::Idle;
			return None;
		}
		if !applying.echoed {
			debug!(patch = ?applying.patch, "applied edit produced no matching change");
		}

		match self.reconciliation {
			Reconciliation::Reconciling(waiting) if applying.patch != Some(waiting) => self.propose(),
			_ => {
				self.reconciliation = Reconciliation::Idle;
				None
			}
		}
	}

	/// Records the patch the peer assigned to a pushed version.
	///
	/// Answers from before the latest peer restart are ignored.
	pub fn on_version_response(&mut self, generation: u64, version: Version, resp: VersionResponse) {
		if generation != self.generation {
			debug!(generation, current = self.generation, "ignoring answer from restarted peer");
			return;
		}
		debug!(patch = resp.patch, version, "peer patch equals host version");
		self.version_patches.insert(resp.patch, version);
	}

	/// Reconciles the waiting proposal against the current version.
	fn propose(&mut self) -> Option<Proposal> {
		let Reconciliation::Reconciling(patch) = self.reconciliation else {
			return None;
		};
		debug_assert!(self.in_flight.is_none());

		let walk = self.walk(patch);
		if let Walk::Root { root, .. } = walk {
			self.prune(root);
		}
		let (root, diffs) = match walk {
			Walk::Broken { missing } => {
				error!(patch, missing, "broken peer lineage, abandoning proposal");
				self.reconciliation = Reconciliation::Idle;
				return None;
			}
			Walk::Root { root, version, .. } if version != self.version => {
				info!(
					patch,
					root,
					root_version = version,
					version = self.version,
					"dropping stale peer proposal"
				);
				self.reconciliation = Reconciliation::Idle;
				return None;
			}
			Walk::Root { root, diffs, .. } => (root, diffs),
		};

		if diffs.is_empty() {
			debug!(patch, "peer proposal already matches host version");
			self.reconciliation = Reconciliation::Idle;
			return None;
		}

		let diff = Diff::flatten(diffs.into_iter().rev());
		let expected = match self.doc.edit(&diff) {
			Ok(doc) => doc,
			Err(err) => {
				error!(patch, root, error = %err, "peer proposal does not apply to host document");
				self.reconciliation = Reconciliation::Idle;
				return None;
			}
		};

		debug!(patch, root, changes = diff.len(), "proposing peer edit");
		self.in_flight = Some(Applying {
			patch: Some(patch),
			expected,
			echoed: false,
		});
		Some(Proposal { patch, diff })
	}

	/// Forgets patches no later walk can reach.
	///
	/// Proposals only move forward within a generation and each patch builds
	/// on the one before it, so every later walk stops at `root` or earlier.
	fn prune(&mut self, root: Patch) {
		self.patches.retain(|&patch, _| patch > root);
		self.version_patches.retain(|&patch, _| patch >= root);
	}

	/// Follows `prior` pointers from `patch` to the nearest patch with a known version.
	fn walk(&self, mut patch: Patch) -> Walk {
		let mut diffs = Vec::new();
		loop {
			if let Some(&version) = self.version_patches.get(&patch) {
				return Walk::Root {
					root: patch,
					version,
					diffs,
				};
			}
			match self.patches.get(&patch) {
				// Priors always point backwards, so the walk terminates.
				Some(lineage) if lineage.prior < patch => {
					diffs.push(lineage.diff.clone());
					patch = lineage.prior;
				}
				_ => return Walk::Broken { missing: patch },
			}
		}
	}
}
