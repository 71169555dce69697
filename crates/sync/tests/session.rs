//! End-to-end sessions over the in-process link.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tandem_sync::{
	HostChange, HostDocument, HostSync, MemoryDocument, MemoryEditor, Session, SyncConfig,
};
use tandem_text::{Diff, Replace};
use tokio::sync::mpsc;
// Dependencies of the library and its unit tests, unused by this test crate.
#[allow(unused_imports, reason = "silences unused_crate_dependencies in the test crate")]
use {
	proptest as _, serde as _, serde_json as _, tandem_rpc as _, tempfile as _, thiserror as _,
	tokio_util as _, toml as _, tracing as _,
};

struct Harness {
	document: MemoryDocument,
	editor: MemoryEditor,
	session: Session<MemoryEditor>,
}

impl Harness {
	async fn start(version: u64, text: &str, config: &SyncConfig) -> Self {
		let (document, changes) = MemoryDocument::new(version, text);
		let (editor, edits) = MemoryEditor::new();
		let session = Session::spawn(
			HostSync::new(version, text),
			document.clone(),
			changes,
			editor.clone(),
			edits,
			config,
		);
		session.settle().await;
		Self {
			document,
			editor,
			session,
		}
	}

	fn assert_converged(&self, expected: &str) {
		assert_eq!(self.document.text(), expected);
		assert_eq!(self.editor.text(), expected);
	}
}

#[tokio::test(flavor = "current_thread")]
async fn handshake_seeds_editor() {
	let h = Harness::start(5, "hello", &SyncConfig::default()).await;
	h.assert_converged("hello");
}

#[tokio::test(flavor = "current_thread")]
async fn peer_edit_echoes_without_reset() {
	let h = Harness::start(5, "hello", &SyncConfig::default()).await;

	assert!(h.editor.edit(Replace::insert(5, "!")));
	h.session.settle().await;

	h.assert_converged("hello!");
	assert_eq!(h.document.version(), 6);

	let (host, peer) = h.session.close().await.unwrap();
	assert_eq!(host.version_of(1), Some(6));
	// A reset would have allocated another patch.
	assert_eq!(peer.patch(), Some(1));
	assert_eq!(peer.patch_of(6), Some(1));
}

#[tokio::test(flavor = "current_thread")]
async fn host_wins_concurrent_edits() {
	let h = Harness::start(0, "hello", &SyncConfig::default()).await;

	// Neither side has seen the other's edit.
	assert!(h.document.edit(Replace::insert(5, " world")));
	assert!(h.editor.edit(Replace::insert(5, "!")));
	h.session.settle().await;

	h.assert_converged("hello world");
	assert_eq!(h.document.version(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn host_edit_resets_peer() {
	let h = Harness::start(0, "abc", &SyncConfig::default()).await;

	assert!(h.document.edit(Replace::new(1, 2, "XYZ")));
	h.session.settle().await;
	h.assert_converged("aXYZc");

	// The peer keeps building on the reset text.
	assert!(h.editor.edit(Replace::insert(5, "!")));
	h.session.settle().await;
	h.assert_converged("aXYZc!");
	assert_eq!(h.document.version(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn alternating_edits_converge() {
	let config = SyncConfig::from_toml_str("max_pending_requests = 4\nlog_messages = true\n").unwrap();
	let h = Harness::start(0, "", &config).await;

	for round in 0..8 {
		if round % 2 == 0 {
			let at = h.editor.text().encode_utf16().count();
			assert!(h.editor.edit(Replace::insert(at, format!("p{round}"))));
		} else {
			assert!(h.document.edit(Replace::insert(0, format!("h{round}"))));
		}
		h.session.settle().await;
		assert_eq!(h.document.text(), h.editor.text(), "diverged after round {round}");
	}
	h.assert_converged("h7h5h3h1p0p2p4p6");
}

#[tokio::test(flavor = "current_thread")]
async fn rapid_peer_edits_coalesce() {
	let h = Harness::start(0, "", &SyncConfig::default()).await;

	for ch in ["a", "b", "c", "d"] {
		let at = h.editor.text().len();
		assert!(h.editor.edit(Replace::insert(at, ch)));
	}
	h.session.settle().await;
	h.assert_converged("abcd");
}

#[tokio::test(flavor = "current_thread")]
async fn rejected_apply_is_repaired_by_next_host_edit() {
	let h = Harness::start(0, "hello", &SyncConfig::default()).await;

	h.document.set_read_only(true);
	assert!(h.editor.edit(Replace::insert(5, "!")));
	h.session.settle().await;
	assert_eq!(h.document.text(), "hello");
	assert_eq!(h.editor.text(), "hello!");

	h.document.set_read_only(false);
	assert!(h.document.edit(Replace::insert(0, ">")));
	h.session.settle().await;
	h.assert_converged(">hello");
}

#[tokio::test(flavor = "current_thread")]
async fn restarted_peer_resynchronizes() {
	let mut h = Harness::start(0, "one", &SyncConfig::default()).await;
	assert!(h.editor.edit(Replace::insert(3, " two")));
	h.session.settle().await;

	let old = h.session.restart_peer().await.unwrap();
	assert_eq!(old.patch(), Some(1));
	h.session.settle().await;
	h.assert_converged("one two");

	assert!(h.editor.edit(Replace::insert(7, " three")));
	h.session.settle().await;
	h.assert_converged("one two three");

	let (host, peer) = h.session.close().await.unwrap();
	assert_eq!(host.generation(), 2);
	assert_eq!(peer.patch(), Some(1));
}

#[tokio::test(flavor = "current_thread")]
async fn closing_host_document_ends_session() {
	let h = Harness::start(0, "bye", &SyncConfig::default()).await;
	h.document.close();

	tokio::time::timeout(Duration::from_secs(5), async {
		while !h.session.is_finished() {
			tokio::task::yield_now().await;
		}
	})
	.await
	.expect("both loops should stop");
}

/// A host document whose change notifications are sent by the test itself.
#[derive(Clone)]
struct ScriptedDocument {
	text: Arc<Mutex<String>>,
}

impl ScriptedDocument {
	fn new(text: &str) -> Self {
		Self {
			text: Arc::new(Mutex::new(text.into())),
		}
	}

	fn set(&self, text: &str) {
		*self.text.lock() = text.into();
	}
}

impl HostDocument for ScriptedDocument {
	fn text(&self) -> String {
		self.text.lock().clone()
	}

	fn apply_edit(&self, _diff: Diff) -> BoxFuture<'static, bool> {
		future::ready(false).boxed()
	}
}

struct Scripted {
	document: ScriptedDocument,
	changes: mpsc::UnboundedSender<HostChange>,
	editor: MemoryEditor,
	session: Session<MemoryEditor>,
}

impl Scripted {
	async fn start(text: &str) -> Self {
		let document = ScriptedDocument::new(text);
		let (changes, rx) = mpsc::unbounded_channel();
		let (editor, edits) = MemoryEditor::new();
		let session = Session::spawn(
			HostSync::new(0, text),
			document.clone(),
			rx,
			editor.clone(),
			edits,
			&SyncConfig::default(),
		);
		session.settle().await;
		assert_eq!(editor.text(), text);
		Self {
			document,
			changes,
			editor,
			session,
		}
	}
}

#[tokio::test(flavor = "current_thread")]
async fn version_gap_resyncs_peer_to_document_text() {
	let Scripted {
		document,
		changes,
		editor,
		session,
	} = Scripted::start("abc").await;

	// Versions 1 and 2 were never reported.
	document.set("abc def ghi");
	changes
		.send(HostChange {
			previous: 2,
			version: 3,
			diff: Replace::insert(7, " ghi").into(),
		})
		.unwrap();
	// Already part of the text read during the resync.
	changes
		.send(HostChange {
			previous: 3,
			version: 4,
			diff: Replace::insert(0, "").into(),
		})
		.unwrap();
	session.settle().await;
	assert_eq!(editor.text(), "abc def ghi");

	let (host, peer) = session.close().await.unwrap();
	assert_eq!(host.version(), 4);
	assert_eq!(host.doc().to_string(), "abc def ghi");
	assert_eq!(peer.patch_of(4), Some(1));
	assert_eq!(host.version_of(1), Some(4));
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_change_resyncs_peer_to_document_text() {
	let Scripted {
		document,
		changes,
		editor,
		session,
	} = Scripted::start("abc").await;

	document.set("xyz");
	changes
		.send(HostChange {
			previous: 0,
			version: 1,
			diff: Replace::delete(1, 40).into(),
		})
		.unwrap();
	session.settle().await;
	assert_eq!(editor.text(), "xyz");

	assert!(editor.edit(Replace::insert(3, "!")));
	session.settle().await;
	// The scripted document refuses edits, so the host keeps its text.
	assert_eq!(document.text(), "xyz");

	let (host, _) = session.close().await.unwrap();
	assert_eq!(host.version(), 1);
}
