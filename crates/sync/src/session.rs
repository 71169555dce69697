//! A host loop and a peer loop wired over an in-process link.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tandem_rpc::{ChannelTransport, link_pair};
use tandem_text::Diff;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::document::{HostDocument, PeerEditor};
use crate::error::Result;
use crate::host::{HostChange, HostLoop, HostSync};
use crate::peer::{PeerExit, PeerLoop, PeerSync};

/// Consecutive idle yields after which a session counts as settled.
const SETTLE_ROUNDS: usize = 16;

/// Both sides of a running session.
///
/// Dropping the session cancels both loops. Closing the host document ends
/// the session as well.
pub struct Session<E> {
	host: JoinHandle<HostSync>,
	peer: JoinHandle<PeerExit<E>>,
	/// The peer's outbound half, handed to each restarted peer.
	peer_transport: ChannelTransport,
	config: SyncConfig,
	shutdown: CancellationToken,
	peer_shutdown: CancellationToken,
	activity: Arc<AtomicU64>,
	_guard: DropGuard,
}

impl<E> Session<E>
where
	E: PeerEditor + 'static,
{
	/// Spawns both loops on the current tokio runtime.
	///
	/// # Panics
	///
	/// Panics if called outside a tokio runtime.
	pub fn spawn<D>(
		sync: HostSync,
		document: D,
		changes: mpsc::UnboundedReceiver<HostChange>,
		editor: E,
		edits: mpsc::UnboundedReceiver<Diff>,
		config: &SyncConfig,
	) -> Self
	where
		D: HostDocument + 'static,
	{
		let (host_link, peer_link) = link_pair();
		let shutdown = CancellationToken::new();
		let activity = Arc::new(AtomicU64::new(0));

		info!(
			version = sync.version(),
			max_pending = config.max_pending_requests,
			"starting sync session"
		);
		let host = HostLoop::new(
			sync,
			document,
			changes,
			host_link.transport,
			host_link.inbound,
			config,
			shutdown.clone(),
		)
		.with_activity(activity.clone());

		let peer_shutdown = shutdown.child_token();
		let peer_transport = peer_link.transport;
		let peer = PeerLoop::new(
			editor,
			edits,
			peer_transport.clone(),
			peer_link.inbound,
			config,
			peer_shutdown.clone(),
		)
		.with_activity(activity.clone());

		Self {
			host: tokio::spawn(host.run()),
			peer: tokio::spawn(peer.run()),
			peer_transport,
			config: config.clone(),
			_guard: shutdown.clone().drop_guard(),
			shutdown,
			peer_shutdown,
			activity,
		}
	}

	/// Replaces the peer with a fresh one on the same link.
	///
	/// The new peer starts unsynchronized and performs its own handshake.
	/// Returns the state the old peer ended with.
	///
	/// # Errors
	///
	/// Returns [`Error::Join`](crate::Error::Join) if the old peer task panicked.
	pub async fn restart_peer(&mut self) -> Result<PeerSync> {
		self.peer_shutdown.cancel();
		let exit = (&mut self.peer).await?;
		debug!(patch = ?exit.sync.patch(), "peer stopped for restart");

		self.peer_shutdown = self.shutdown.child_token();
		let peer = PeerLoop::new(
			exit.editor,
			exit.edits,
			self.peer_transport.clone(),
			exit.inbound,
			&self.config,
			self.peer_shutdown.clone(),
		)
		.with_ids(exit.ids)
		.with_activity(self.activity.clone());
		self.peer = tokio::spawn(peer.run());
		Ok(exit.sync)
	}

	/// Waits until neither side has handled an event for a while.
	pub async fn settle(&self) {
		let mut last = self.activity.load(Ordering::Relaxed);
		let mut idle = 0;
		while idle < SETTLE_ROUNDS {
			tokio::task::yield_now().await;
			let now = self.activity.load(Ordering::Relaxed);
			if now == last {
				idle += 1;
			} else {
				last = now;
				idle = 0;
			}
		}
	}

	/// Returns true once both loops have stopped.
	pub fn is_finished(&self) -> bool {
		self.host.is_finished() && self.peer.is_finished()
	}

	/// Stops both loops and returns their final controller states.
	///
	/// # Errors
	///
	/// Returns [`Error::Join`](crate::Error::Join) if either task panicked.
	pub async fn close(self) -> Result<(HostSync, PeerSync)> {
		self.shutdown.cancel();
		let host = self.host.await?;
		let peer = self.peer.await?;
		Ok((host, peer.sync))
	}
}
