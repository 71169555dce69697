use serde::{Deserialize, Serialize};

use crate::DiffError;

/// Replaces the half-open range `[start, end)` with `text`.
///
/// Offsets count UTF-16 code units and only make sense against the snapshot
/// the replacement is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replace {
	/// First replaced code unit.
	pub start: usize,
	/// One past the last replaced code unit.
	pub end: usize,
	/// Replacement text.
	pub text: String,
}

impl Replace {
	/// Creates a replacement of `[start, end)`.
	pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
		Self {
			start,
			end,
			text: text.into(),
		}
	}

	/// Creates a pure insertion at `at`.
	pub fn insert(at: usize, text: impl Into<String>) -> Self {
		Self::new(at, at, text)
	}

	/// Creates a pure deletion of `[start, end)`.
	pub fn delete(start: usize, end: usize) -> Self {
		Self::new(start, end, String::new())
	}

	/// Length of the replacement text in UTF-16 code units.
	pub fn text_len(&self) -> usize {
		self.text.encode_utf16().count()
	}

	/// Signed change in document length caused by this replacement.
	pub fn delta(&self) -> isize {
		self.text_len() as isize - (self.end as isize - self.start as isize)
	}
}

/// An ordered list of replacements, in chronological order.
///
/// Serializes as a bare array of [`Replace`] objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
	changes: Vec<Replace>,
}

impl Diff {
	/// Creates a diff from replacements that apply one after another.
	pub fn new(changes: Vec<Replace>) -> Self {
		Self { changes }
	}

	/// Creates a diff from replacements addressed against one shared snapshot.
	///
	/// The replacements must be sorted left to right and must not overlap.
	/// Each one is shifted by the total length change of those before it so
	/// that sequential application produces the intended text.
	///
	/// # Errors
	///
	/// Returns [`DiffError::Inverted`] or [`DiffError::Overlapping`] when the
	/// input does not meet those requirements.
	pub fn from_simultaneous(changes: impl IntoIterator<Item = Replace>) -> Result<Self, DiffError> {
		let mut shift: isize = 0;
		let mut previous_end = 0;
		let mut out = Vec::new();
		for (index, change) in changes.into_iter().enumerate() {
			if change.start > change.end {
				return Err(DiffError::Inverted {
					index,
					start: change.start,
					end: change.end,
				});
			}
			if change.start < previous_end {
				return Err(DiffError::Overlapping {
					index,
					start: change.start,
					previous_end,
				});
			}
			previous_end = change.end;
			let delta = change.delta();
			// Left-to-right order keeps the shifted offsets non-negative.
			let start = change.start.saturating_add_signed(shift);
			let end = change.end.saturating_add_signed(shift);
			out.push(Replace::new(start, end, change.text));
			shift += delta;
		}
		Ok(Self::new(out))
	}

	/// Concatenates diffs, preserving their order.
	///
	/// Applying the result once is equivalent to applying each input in turn.
	pub fn flatten(diffs: impl IntoIterator<Item = Diff>) -> Self {
		Self {
			changes: diffs.into_iter().flat_map(|diff| diff.changes).collect(),
		}
	}

	/// Returns the replacements in application order.
	pub fn changes(&self) -> &[Replace] {
		&self.changes
	}

	/// Returns true if the diff contains no replacements.
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}

	/// Returns the number of replacements.
	pub fn len(&self) -> usize {
		self.changes.len()
	}
}

impl From<Vec<Replace>> for Diff {
	fn from(changes: Vec<Replace>) -> Self {
		Self::new(changes)
	}
}

impl From<Replace> for Diff {
	fn from(change: Replace) -> Self {
		Self::new(vec![change])
	}
}

impl FromIterator<Replace> for Diff {
	fn from_iter<I: IntoIterator<Item = Replace>>(iter: I) -> Self {
		Self::new(iter.into_iter().collect())
	}
}

impl IntoIterator for Diff {
	type Item = Replace;
	type IntoIter = std::vec::IntoIter<Replace>;

	fn into_iter(self) -> Self::IntoIter {
		self.changes.into_iter()
	}
}
