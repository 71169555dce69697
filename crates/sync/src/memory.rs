//! In-memory collaborators for tests and scenario replay.

use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use tandem_text::{Diff, Doc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::document::{HostDocument, PeerEditor};
use crate::host::HostChange;
use crate::protocol::Version;

#[derive(Debug)]
struct DocumentState {
	doc: Doc,
	version: Version,
	read_only: bool,
	changes: Option<mpsc::UnboundedSender<HostChange>>,
}

impl DocumentState {
	fn apply(&mut self, diff: Diff) -> bool {
		if self.read_only {
			debug!(version = self.version, "document is read-only, refusing edit");
			return false;
		}
		let Some(changes) = self.changes.as_ref() else {
			return false;
		};
		let doc = match self.doc.edit(&diff) {
			Ok(doc) => doc,
			Err(err) => {
				warn!(version = self.version, error = %err, "refusing malformed edit");
				return false;
			}
		};
		let previous = self.version;
		self.doc = doc;
		self.version += 1;
		let _: Result<_, _> = changes.send(HostChange {
			previous,
			version: self.version,
			diff,
		});
		true
	}
}

/// A host document held in memory.
///
/// Clones share the same document.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
	state: Arc<Mutex<DocumentState>>,
}

impl MemoryDocument {
	/// Creates a document at `version` and the receiver of its change notifications.
	pub fn new(version: Version, text: &str) -> (Self, mpsc::UnboundedReceiver<HostChange>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let state = DocumentState {
			doc: Doc::new(text),
			version,
			read_only: false,
			changes: Some(tx),
		};
		(
			Self {
				state: Arc::new(Mutex::new(state)),
			},
			rx,
		)
	}

	/// Edits the document as one of its own users would.
	///
	/// Returns `false` if the document is read-only, closed, or the diff does
	/// not apply.
	pub fn edit(&self, diff: impl Into<Diff>) -> bool {
		self.state.lock().apply(diff.into())
	}

	/// Returns the current version.
	pub fn version(&self) -> Version {
		self.state.lock().version
	}

	/// Makes every further edit fail.
	pub fn set_read_only(&self, read_only: bool) {
		self.state.lock().read_only = read_only;
	}

	/// Closes the document; its change channel ends.
	pub fn close(&self) {
		self.state.lock().changes = None;
	}
}

impl HostDocument for MemoryDocument {
	fn text(&self) -> String {
		self.state.lock().doc.to_string()
	}

	fn apply_edit(&self, diff: Diff) -> BoxFuture<'static, bool> {
		future::ready(self.state.lock().apply(diff)).boxed()
	}
}

#[derive(Debug)]
struct EditorState {
	doc: Doc,
	edits: mpsc::UnboundedSender<Diff>,
}

/// A peer editor held in memory.
///
/// Clones share the same editor, so a test can keep one to type into while
/// the peer loop owns another.
#[derive(Debug, Clone)]
pub struct MemoryEditor {
	state: Arc<Mutex<EditorState>>,
}

impl MemoryEditor {
	/// Creates an empty editor and the receiver of its local edits.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Diff>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let state = EditorState {
			doc: Doc::default(),
			edits: tx,
		};
		(
			Self {
				state: Arc::new(Mutex::new(state)),
			},
			rx,
		)
	}

	/// Types into the editor.
	///
	/// Returns `false` if the diff does not apply to the visible text.
	pub fn edit(&self, diff: impl Into<Diff>) -> bool {
		let diff = diff.into();
		let mut state = self.state.lock();
		match state.doc.edit(&diff) {
			Ok(doc) => {
				state.doc = doc;
				let _: Result<_, _> = state.edits.send(diff);
				true
			}
			Err(err) => {
				warn!(error = %err, "editor refused malformed edit");
				false
			}
		}
	}

	/// Returns the visible text.
	pub fn text(&self) -> String {
		self.state.lock().doc.to_string()
	}
}

impl PeerEditor for MemoryEditor {
	fn reset(&mut self, text: &str) {
		self.state.lock().doc = Doc::new(text);
	}
}
