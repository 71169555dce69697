//! Event loop driving [`HostSync`] against a host document and a peer link.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tandem_rpc::{ChannelTransport, Endpoint, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{HostChange, HostSync, Proposal};
use crate::config::SyncConfig;
use crate::document::HostDocument;
use crate::protocol::{HostRequest, HostResponse, PeerRequest, Version, VersionRequest, VersionResponse};

type HostEndpoint<T> = Endpoint<T, HostRequest, HostResponse, PeerRequest>;

/// An answered (or abandoned) version push, with the generation and version it was sent for.
type PushAnswer = (u64, Version, tandem_rpc::Result<VersionResponse>);

/// Drives the host side of a session.
///
/// Owns the controller, the host document handle and the host endpoint. Runs
/// until the shutdown token is cancelled, the host document closes its
/// change stream, or the peer link goes away.
pub struct HostLoop<D, T = ChannelTransport> {
	sync: HostSync,
	document: D,
	endpoint: HostEndpoint<T>,
	inbound: mpsc::UnboundedReceiver<String>,
	changes: mpsc::UnboundedReceiver<HostChange>,
	/// The reconciled edit submitted to the host document.
	applying: Option<BoxFuture<'static, bool>>,
	/// Version pushes awaiting the peer's answer.
	pushes: FuturesUnordered<BoxFuture<'static, PushAnswer>>,
	shutdown: CancellationToken,
	activity: Arc<AtomicU64>,
}

impl<D, T> HostLoop<D, T>
where
	D: HostDocument,
	T: Transport,
{
	/// Creates a host loop.
	pub fn new(
		sync: HostSync,
		document: D,
		changes: mpsc::UnboundedReceiver<HostChange>,
		transport: T,
		inbound: mpsc::UnboundedReceiver<String>,
		config: &SyncConfig,
		shutdown: CancellationToken,
	) -> Self {
		let endpoint = Endpoint::new(transport)
			.with_label("host")
			.with_max_pending(config.max_pending_requests)
			.with_message_logging(config.log_messages);
		Self {
			sync,
			document,
			endpoint,
			inbound,
			changes,
			applying: None,
			pushes: FuturesUnordered::new(),
			shutdown,
			activity: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Shares a counter bumped on every handled event.
	#[must_use]
	pub fn with_activity(mut self, activity: Arc<AtomicU64>) -> Self {
		self.activity = activity;
		self
	}

	/// Runs until shutdown and returns the controller.
	pub async fn run(mut self) -> HostSync {
		debug!(version = self.sync.version(), "host loop started");
		loop {
			tokio::select! {
				biased;

				() = self.shutdown.cancelled() => break,

				Some((generation, version, answer)) = self.pushes.next(), if !self.pushes.is_empty() => {
					self.on_push_answered(generation, version, answer);
				}

				applied = next_applied(&mut self.applying), if self.applying.is_some() => {
					self.on_applied(applied);
				}

				change = self.changes.recv() => match change {
					Some(change) => self.on_change(change),
					None => {
						info!("host document closed, ending session");
						self.shutdown.cancel();
						break;
					}
				},

				frame = self.inbound.recv() => match frame {
					Some(frame) => self.on_frame(&frame),
					None => {
						debug!("peer link closed");
						break;
					}
				},
			}
			self.activity.fetch_add(1, Ordering::Relaxed);
		}

		// Pending pushes must not resolve against a peer that is gone.
		self.endpoint.close();
		self.sync
	}

	fn on_frame(&mut self, frame: &str) {
		let sync = &mut self.sync;
		let mut proposal = None;
		let dispatched = self.endpoint.dispatch_text(frame, |request| {
			let (response, next) = sync.on_request(request);
			proposal = next;
			Some(response)
		});
		if let Err(error) = dispatched {
			warn!(%error, "dropping inbound frame");
		}
		self.submit(proposal);

		// A response may have resolved a push; record it before the next frame.
		while let Some(Some((generation, version, answer))) = self.pushes.next().now_or_never() {
			self.on_push_answered(generation, version, answer);
		}
	}

	fn on_change(&mut self, change: HostChange) {
		let version = change.version;
		match self.sync.on_local_edit(change) {
			Ok(update) => {
				self.push(update.push);
				self.submit(update.proposal);
			}
			Err(error) => {
				warn!(%error, version, "host mirror lost track of document");
				self.resync(version);
			}
		}
	}

	fn resync(&mut self, mut version: Version) {
		// Queued changes are already part of the document text.
		while let Ok(change) = self.changes.try_recv() {
			version = change.version;
		}
		let text = self.document.text();
		let update = self.sync.resync(version, &text);
		self.push(update.push);
	}

	fn on_applied(&mut self, applied: bool) {
		// Notifications for the edit are queued before it completes.
		while let Ok(change) = self.changes.try_recv() {
			self.on_change(change);
		}
		let proposal = self.sync.on_applied(applied);
		self.submit(proposal);
	}

	fn on_push_answered(&mut self, generation: u64, version: Version, answer: tandem_rpc::Result<VersionResponse>) {
		match answer {
			Ok(response) => self.sync.on_version_response(generation, version, response),
			Err(tandem_rpc::Error::Canceled) => {
				debug!(generation, version, "version push abandoned");
			}
			Err(error) => warn!(%error, generation, version, "version push failed"),
		}
	}

	fn push(&mut self, request: VersionRequest) {
		let generation = self.sync.generation();
		let version = request.version;
		if generation == 0 {
			trace!(version, "no peer started yet, not pushing");
			return;
		}
		debug!(
			previous = request.previous,
			version,
			patch = ?request.patch,
			"pushing host version"
		);
		let answer = self.endpoint.request::<VersionResponse>(HostRequest::Version(request));
		self.pushes
			.push(answer.map(move |answer| (generation, version, answer)).boxed());
	}

	fn submit(&mut self, proposal: Option<Proposal>) {
		let Some(proposal) = proposal else {
			return;
		};
		debug_assert!(self.applying.is_none());
		debug!(patch = proposal.patch, changes = proposal.diff.len(), "applying peer edit");
		self.applying = Some(self.document.apply_edit(proposal.diff));
	}
}

async fn next_applied(applying: &mut Option<BoxFuture<'static, bool>>) -> bool {
	match applying {
		Some(apply) => {
			let applied = apply.await;
			*applying = None;
			applied
		}
		None => future::pending().await,
	}
}
