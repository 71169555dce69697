//! Text values exchanged by the synchronization protocol.
//!
//! A [`Doc`] is an immutable snapshot of document text, and a [`Diff`] is an
//! ordered list of [`Replace`] operations addressed in UTF-16 code units.
//!
//! # Application order
//!
//! [`Doc::edit`] applies the replacements of a diff one after another, each
//! against the text produced by the previous one, using its offsets verbatim.
//! Later entries are never shifted by the length change of earlier ones. Both
//! sides of a sync session rely on this, so it must not change. Edits that
//! were computed simultaneously against a single snapshot go through
//! [`Diff::from_simultaneous`] first.

#![warn(missing_docs)]

/// Ordered replacement lists.
pub mod diff;
/// Immutable document snapshots.
pub mod doc;
/// Errors raised while building or applying diffs.
pub mod error;

pub use diff::{Diff, Replace};
pub use doc::Doc;
pub use error::DiffError;

#[cfg(test)]
mod tests;
