//! Event loop driving [`PeerSync`] against an editor and a host link.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tandem_rpc::{ChannelTransport, CounterIdGen, Endpoint, ResponseFuture, Transport};
use tandem_text::Diff;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::PeerSync;
use crate::config::SyncConfig;
use crate::document::PeerEditor;
use crate::protocol::{HostRequest, Patch, PatchRequest, PatchResponse, PeerRequest, PeerResponse, StartResponse};

type PeerEndpoint<T> = Endpoint<T, PeerRequest, PeerResponse, HostRequest>;

/// What a stopped peer loop hands back so a new one can take over the link.
pub struct PeerExit<E> {
	/// Final controller state.
	pub sync: PeerSync,
	/// The editor, as last reset.
	pub editor: E,
	/// Frames from the host not yet handled.
	pub inbound: mpsc::UnboundedReceiver<String>,
	/// Editor changes not yet handled.
	pub edits: mpsc::UnboundedReceiver<Diff>,
	/// Next unused request id on the link.
	pub ids: CounterIdGen,
}

/// Drives the peer side of a session.
///
/// Starts with the handshake and runs until the shutdown token is
/// cancelled, the editor closes its change stream, or the host link goes away.
pub struct PeerLoop<E, T = ChannelTransport> {
	sync: PeerSync,
	editor: E,
	endpoint: PeerEndpoint<T>,
	inbound: mpsc::UnboundedReceiver<String>,
	edits: mpsc::UnboundedReceiver<Diff>,
	starting: Option<ResponseFuture<StartResponse>>,
	/// Patch requests awaiting the host's acknowledgement.
	acks: FuturesUnordered<BoxFuture<'static, (Patch, tandem_rpc::Result<PatchResponse>)>>,
	shutdown: CancellationToken,
	activity: Arc<AtomicU64>,
}

impl<E, T> PeerLoop<E, T>
where
	E: PeerEditor,
	T: Transport,
{
	/// Creates a peer loop.
	pub fn new(
		editor: E,
		edits: mpsc::UnboundedReceiver<Diff>,
		transport: T,
		inbound: mpsc::UnboundedReceiver<String>,
		config: &SyncConfig,
		shutdown: CancellationToken,
	) -> Self {
		let endpoint = Endpoint::new(transport)
			.with_label("peer")
			.with_max_pending(config.max_pending_requests)
			.with_message_logging(config.log_messages);
		Self {
			sync: PeerSync::new(),
			editor,
			endpoint,
			inbound,
			edits,
			starting: None,
			acks: FuturesUnordered::new(),
			shutdown,
			activity: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Continues request numbering from a previous peer on the same link.
	#[must_use]
	pub fn with_ids(mut self, ids: CounterIdGen) -> Self {
		self.endpoint = self.endpoint.with_ids(ids);
		self
	}

	/// Shares a counter bumped on every handled event.
	#[must_use]
	pub fn with_activity(mut self, activity: Arc<AtomicU64>) -> Self {
		self.activity = activity;
		self
	}

	/// Performs the handshake, then runs until shutdown.
	pub async fn run(mut self) -> PeerExit<E> {
		let start = self.sync.start_request();
		debug!(patch = start.patch, "requesting host state");
		self.starting = Some(self.endpoint.request(PeerRequest::Start(start)));

		loop {
			tokio::select! {
				biased;

				() = self.shutdown.cancelled() => break,

				started = next_started(&mut self.starting), if self.starting.is_some() => {
					self.on_started(started);
				}

				Some((patch, ack)) = self.acks.next(), if !self.acks.is_empty() => {
					on_ack(patch, ack);
				}

				edit = self.edits.recv() => match edit {
					Some(diff) => self.on_edit(diff),
					None => {
						debug!("editor closed");
						break;
					}
				},

				frame = self.inbound.recv() => match frame {
					Some(frame) => self.on_frame(&frame),
					None => {
						debug!("host link closed");
						break;
					}
				},
			}
			self.activity.fetch_add(1, Ordering::Relaxed);
		}

		let ids = self.endpoint.ids();
		self.endpoint.close();
		PeerExit {
			sync: self.sync,
			editor: self.editor,
			inbound: self.inbound,
			edits: self.edits,
			ids,
		}
	}

	fn on_frame(&mut self, frame: &str) {
		// Edits typed before the frame arrived are older than it.
		while let Ok(diff) = self.edits.try_recv() {
			self.on_edit(diff);
		}

		let sync = &mut self.sync;
		let editor = &mut self.editor;
		let dispatched = self.endpoint.dispatch_text(frame, |request| match request {
			HostRequest::Version(req) => match sync.on_version(req) {
				Ok(reply) => {
					if let Some(text) = reply.reset {
						editor.reset(&text);
					}
					Some(reply.response)
				}
				Err(error) => {
					warn!(%error, "ignoring host version");
					None
				}
			},
		});
		if let Err(error) = dispatched {
			warn!(%error, "dropping inbound frame");
		}

		if let Some(Some(started)) = self.starting.as_mut().map(|start| start.now_or_never()) {
			self.starting = None;
			self.on_started(started);
		}
		while let Some(Some((patch, ack))) = self.acks.next().now_or_never() {
			on_ack(patch, ack);
		}
	}

	fn on_started(&mut self, started: tandem_rpc::Result<StartResponse>) {
		match started {
			Ok(resp) => {
				let text = resp.text.clone();
				self.sync.on_start(resp);
				self.editor.reset(&text);
			}
			Err(error) => warn!(%error, "start handshake failed"),
		}
	}

	fn on_edit(&mut self, diff: Diff) {
		match self.sync.on_local_edit(diff) {
			Ok(Some(request)) => self.send_patch(request),
			Ok(None) => {}
			Err(error) => warn!(%error, "dropping local edit"),
		}
	}

	fn send_patch(&mut self, request: PatchRequest) {
		let patch = request.patch;
		let ack = self.endpoint.request::<PatchResponse>(PeerRequest::Patch(request));
		self.acks.push(ack.map(move |ack| (patch, ack)).boxed());
	}
}

fn on_ack(patch: Patch, ack: tandem_rpc::Result<PatchResponse>) {
	match ack {
		Ok(PatchResponse {}) => trace!(patch, "patch acknowledged"),
		Err(tandem_rpc::Error::Canceled) => debug!(patch, "patch acknowledgement abandoned"),
		Err(error) => warn!(%error, patch, "patch request failed"),
	}
}

async fn next_started(starting: &mut Option<ResponseFuture<StartResponse>>) -> tandem_rpc::Result<StartResponse> {
	match starting {
		Some(start) => {
			let started = start.await;
			*starting = None;
			started
		}
		None => future::pending().await,
	}
}
