//! Request/response correlation over an asynchronous message channel.
//!
//! This crate provides the transport-agnostic pieces both sync peers share:
//! * [`Message`]: the tagged request/response wire envelope
//! * [`Transport`]: the outbound half of a channel
//! * [`Endpoint`]: id stamping, the pending-request table and inbound dispatch
//! * [`ResponseFuture`]: the single-use continuation for one request
//!
//! Ids are unique among one sender's in-flight requests only. There is no
//! retry and no timeout; an unanswered request stays pending until the
//! endpoint is closed or the bounded table evicts it.

#![warn(missing_docs)]

pub mod endpoint;
pub mod error;
pub mod message;
pub mod transport;

pub use endpoint::{DEFAULT_MAX_PENDING, Endpoint, ResponseFuture};
pub use error::{Error, Result};
pub use message::{CounterIdGen, Message, RequestId};
pub use serde_json::Value as JsonValue;
pub use transport::{ChannelTransport, Link, Transport, link_pair};
