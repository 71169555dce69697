//! Two-party text replica synchronization.
//!
//! A host owns the authoritative document and counts its changes as
//! versions. A peer owns a detached replica and counts its own edits as
//! patches. Neither side sequences the other's edits; instead each learns
//! which of its counters equal the other's through the handshake messages in
//! [`protocol`]:
//! * every host change is pushed to the peer, which answers with a patch
//! * every peer edit is sent to the host as a patch on top of an earlier one
//! * the host applies a peer edit only if the patch it builds on is known to
//!   equal the current version; otherwise host edits win and the peer resets
//!
//! [`HostSync`] and [`PeerSync`] are the sans-IO state machines.
//! [`HostLoop`] and [`PeerLoop`] drive them over a [`tandem_rpc`] channel,
//! and [`Session`] wires both loops together in one process.

#![warn(missing_docs)]

pub mod config;
pub mod document;
pub mod error;
pub mod host;
pub mod memory;
pub mod peer;
pub mod protocol;
pub mod session;

pub use config::SyncConfig;
pub use document::{HostDocument, PeerEditor};
pub use error::{ConfigError, Error, Result};
pub use host::{HostChange, HostLoop, HostSync, HostUpdate, Proposal, Reconciliation};
pub use memory::{MemoryDocument, MemoryEditor};
pub use peer::{PeerExit, PeerLoop, PeerReply, PeerSync};
pub use session::Session;
