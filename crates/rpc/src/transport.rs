//! Outbound halves of a message channel.

use tokio::sync::mpsc;

/// The outbound half of a channel carrying encoded frames.
///
/// Transports are expected to preserve per-direction ordering but need not
/// guarantee delivery.
pub trait Transport {
	/// Hands one frame to the channel.
	///
	/// Returns `false` when the frame could not be posted. Callers only log
	/// this; nothing is retried.
	fn post(&mut self, frame: String) -> bool;
}

impl<F> Transport for F
where
	F: FnMut(String) -> bool,
{
	fn post(&mut self, frame: String) -> bool {
		self(frame)
	}
}

/// In-process transport backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
	tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
	/// Wraps the sending half of a frame channel.
	pub fn from_sender(tx: mpsc::UnboundedSender<String>) -> Self {
		Self { tx }
	}

	/// Returns true once the receiving side has gone away.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

impl Transport for ChannelTransport {
	fn post(&mut self, frame: String) -> bool {
		self.tx.send(frame).is_ok()
	}
}

/// One side of an in-process channel: where to post, and what arrives.
#[derive(Debug)]
pub struct Link {
	/// Frames posted here arrive at the other side's `inbound`.
	pub transport: ChannelTransport,
	/// Frames posted by the other side.
	pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Creates two connected in-process links.
pub fn link_pair() -> (Link, Link) {
	let (a_tx, a_rx) = mpsc::unbounded_channel();
	let (b_tx, b_rx) = mpsc::unbounded_channel();
	let a = Link {
		transport: ChannelTransport::from_sender(b_tx),
		inbound: a_rx,
	};
	let b = Link {
		transport: ChannelTransport::from_sender(a_tx),
		inbound: b_rx,
	};
	(a, b)
}
