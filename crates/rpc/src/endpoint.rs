//! Request id stamping, pending-request correlation and inbound dispatch.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::message::{CounterIdGen, Message, RequestId};
use crate::transport::Transport;
use crate::{Error, Result};

/// Default bound on the number of unanswered outgoing requests.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// One side of a request/response channel.
///
/// `OutReq`/`OutResp` are the bodies this side sends; `InReq` is the request
/// body it accepts. Inbound response bodies stay as JSON until the matching
/// [`ResponseFuture`] decodes them into the type its caller expects.
pub struct Endpoint<T, OutReq, OutResp, InReq> {
	/// Outbound half of the channel.
	transport: T,
	/// Counter for generating outgoing request ids.
	ids: CounterIdGen,
	/// Pending outgoing requests awaiting responses, oldest first.
	pending: BTreeMap<RequestId, oneshot::Sender<JsonValue>>,
	max_pending: usize,
	closed: bool,
	log_messages: bool,
	label: &'static str,
	_marker: PhantomData<fn(OutReq, OutResp) -> InReq>,
}

impl<T, OutReq, OutResp, InReq> Endpoint<T, OutReq, OutResp, InReq>
where
	T: Transport,
	OutReq: Serialize,
	OutResp: Serialize,
	InReq: DeserializeOwned,
{
	/// Creates an endpoint posting through `transport`.
	pub fn new(transport: T) -> Self {
		Self {
			transport,
			ids: CounterIdGen::new(),
			pending: BTreeMap::new(),
			max_pending: DEFAULT_MAX_PENDING,
			closed: false,
			log_messages: false,
			label: "rpc",
			_marker: PhantomData,
		}
	}

	/// Sets the bound on unanswered outgoing requests (at least one).
	#[must_use]
	pub fn with_max_pending(mut self, max_pending: usize) -> Self {
		self.max_pending = max_pending.max(1);
		self
	}

	/// Traces every frame posted or received.
	#[must_use]
	pub fn with_message_logging(mut self, enabled: bool) -> Self {
		self.log_messages = enabled;
		self
	}

	/// Names this side in log output.
	#[must_use]
	pub fn with_label(mut self, label: &'static str) -> Self {
		self.label = label;
		self
	}

	/// Continues numbering requests from `ids`.
	///
	/// A replacement endpoint on the same channel must not reuse ids whose
	/// responses may still be in transit.
	#[must_use]
	pub fn with_ids(mut self, ids: CounterIdGen) -> Self {
		self.ids = ids;
		self
	}

	/// Returns the id generator, positioned at the next unused id.
	pub fn ids(&self) -> CounterIdGen {
		self.ids
	}

	/// Returns the number of requests still awaiting a response.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	/// Returns true if `id` is still awaiting a response.
	pub fn is_pending(&self, id: RequestId) -> bool {
		self.pending.contains_key(&id)
	}

	/// Returns true once [`Endpoint::close`] has been called.
	pub fn is_closed(&self) -> bool {
		self.closed
	}

	/// Sends a request and returns the continuation for its response.
	///
	/// The future resolves once a response with the same id is dispatched.
	/// It resolves to [`Error::Canceled`] if the request is evicted or the
	/// endpoint is closed first.
	pub fn request<R: DeserializeOwned>(&mut self, body: OutReq) -> ResponseFuture<R> {
		if self.closed {
			return ResponseFuture::failed(Error::Closed);
		}

		let id = self.ids.next();
		if self.pending.len() >= self.max_pending
			&& let Some((evicted, _)) = self.pending.pop_first()
		{
			warn!(
				side = self.label,
				id = %evicted,
				max_pending = self.max_pending,
				"pending request table full, evicting oldest"
			);
		}

		let message = Message::<OutReq, OutResp>::Request { id, body };
		if let Err(err) = self.post(&message) {
			return ResponseFuture::failed(err);
		}

		let (tx, rx) = oneshot::channel();
		if self.pending.insert(id, tx).is_some() {
			warn!(side = self.label, %id, "request id reused, dropping older continuation");
		}
		ResponseFuture::pending(id, rx)
	}

	/// Routes one inbound message.
	///
	/// Requests are handed to `responder`; its answer is posted back with the
	/// same id. A responder returning `None` leaves the request unanswered.
	/// Responses resolve the matching pending request exactly once; responses
	/// with no pending request are discarded. Nothing is ever sent in reply to
	/// a response.
	///
	/// # Errors
	///
	/// Returns [`Error::Closed`] or [`Error::Encode`] if the response could
	/// not be posted.
	pub fn dispatch<F>(&mut self, message: Message<InReq, JsonValue>, responder: F) -> Result<()>
	where
		F: FnOnce(InReq) -> Option<OutResp>,
	{
		match message {
			Message::Request { id, body } => match responder(body) {
				Some(body) => self.post(&Message::<OutReq, OutResp>::Response { id, body }),
				None => {
					debug!(side = self.label, %id, "request left unanswered");
					Ok(())
				}
			},
			Message::Response { id, body } => {
				match self.pending.remove(&id) {
					// The receiver may already be gone.
					Some(tx) => {
						let _: Result<_, _> = tx.send(body);
					}
					None => {
						debug!(side = self.label, %id, "discarding response with no pending request");
					}
				}
				Ok(())
			}
		}
	}

	/// Decodes one inbound frame and routes it with [`Endpoint::dispatch`].
	///
	/// # Errors
	///
	/// Returns [`Error::Decode`] for frames that are not valid envelopes; the
	/// frame is dropped.
	pub fn dispatch_text<F>(&mut self, frame: &str, responder: F) -> Result<()>
	where
		F: FnOnce(InReq) -> Option<OutResp>,
	{
		if self.log_messages {
			trace!(side = self.label, frame, "received message");
		}
		let message = Message::decode(frame)?;
		self.dispatch(message, responder)
	}

	/// Stops posting and drops every pending continuation.
	pub fn close(&mut self) {
		if !self.closed {
			debug!(side = self.label, pending = self.pending.len(), "closing endpoint");
		}
		self.closed = true;
		self.pending.clear();
	}

	fn post(&mut self, message: &Message<OutReq, OutResp>) -> Result<()> {
		if self.closed {
			return Err(Error::Closed);
		}
		let frame = message.encode()?;
		if self.log_messages {
			trace!(side = self.label, frame = %frame, "posting message");
		}
		if !self.transport.post(frame) {
			error!(side = self.label, id = %message.id(), "failed to post message");
		}
		Ok(())
	}
}

/// The single-use continuation of one outgoing request.
///
/// Resolves to the decoded response body.
#[must_use = "futures do nothing unless polled"]
pub struct ResponseFuture<R> {
	id: Option<RequestId>,
	state: State,
	_marker: PhantomData<fn() -> R>,
}

enum State {
	Pending(oneshot::Receiver<JsonValue>),
	Failed(Option<Error>),
}

impl<R> ResponseFuture<R> {
	fn pending(id: RequestId, rx: oneshot::Receiver<JsonValue>) -> Self {
		Self {
			id: Some(id),
			state: State::Pending(rx),
			_marker: PhantomData,
		}
	}

	fn failed(err: Error) -> Self {
		Self {
			id: None,
			state: State::Failed(Some(err)),
			_marker: PhantomData,
		}
	}

	/// Returns the id the request was sent with, if it was sent.
	pub fn id(&self) -> Option<RequestId> {
		self.id
	}
}

impl<R: DeserializeOwned> Future for ResponseFuture<R> {
	type Output = Result<R>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		match &mut this.state {
			State::Pending(rx) => match ready!(Pin::new(rx).poll(cx)) {
				Ok(value) => Poll::Ready(serde_json::from_value(value).map_err(Error::Decode)),
				Err(_) => Poll::Ready(Err(Error::Canceled)),
			},
			State::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(Error::Canceled))),
		}
	}
}
