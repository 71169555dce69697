//! Collaborators the sync loops drive.

use futures::future::BoxFuture;
use tandem_text::Diff;

/// The authoritative document on the host side.
///
/// Changes to the document, whether made by its own users or through
/// [`HostDocument::apply_edit`], are reported as
/// [`HostChange`](crate::HostChange)s on a channel handed to the host loop.
pub trait HostDocument: Send {
	/// Returns the current full text.
	fn text(&self) -> String;

	/// Applies `diff` to the current version.
	///
	/// Resolves to `false` if the document refused the edit. Change
	/// notifications for an accepted edit must be queued before the future
	/// resolves.
	fn apply_edit(&self, diff: Diff) -> BoxFuture<'static, bool>;
}

/// The editor showing the peer replica.
///
/// Local edits are reported as [`Diff`]s on a channel handed to the peer loop.
pub trait PeerEditor: Send {
	/// Replaces the visible text.
	///
	/// Must not be reported back as a local edit.
	fn reset(&mut self, text: &str);
}
