use std::fmt;

use ropey::Rope;

use crate::{Diff, DiffError, Replace};

/// An immutable document snapshot.
///
/// Equality is text equality. Clones share rope storage, so keeping many
/// snapshots around is cheap.
#[derive(Clone)]
pub struct Doc {
	rope: Rope,
}

impl Doc {
	/// Creates a snapshot of `text`.
	pub fn new(text: &str) -> Self {
		Self {
			rope: Rope::from_str(text),
		}
	}

	/// Returns the text length in UTF-16 code units.
	pub fn len_utf16(&self) -> usize {
		self.rope.len_utf16_cu()
	}

	/// Returns a new snapshot with `diff` applied.
	///
	/// Replacements apply in order, each against the text left by the
	/// previous one, with offsets taken verbatim.
	///
	/// # Errors
	///
	/// Returns [`DiffError`] if a replacement is inverted or reaches past the
	/// end of the text at the moment it is applied.
	pub fn edit(&self, diff: &Diff) -> Result<Self, DiffError> {
		let mut rope = self.rope.clone();
		for (index, change) in diff.changes().iter().enumerate() {
			apply(&mut rope, index, change)?;
		}
		Ok(Self { rope })
	}

	/// Returns a diff that turns this snapshot into `text` in one replacement.
	pub fn replace_all(&self, text: impl Into<String>) -> Diff {
		Diff::from(Replace::new(0, self.len_utf16(), text))
	}
}

fn apply(rope: &mut Rope, index: usize, change: &Replace) -> Result<(), DiffError> {
	if change.start > change.end {
		return Err(DiffError::Inverted {
			index,
			start: change.start,
			end: change.end,
		});
	}
	let len = rope.len_utf16_cu();
	if change.end > len {
		return Err(DiffError::OutOfBounds {
			index,
			end: change.end,
			len,
		});
	}

	let start = rope.utf16_cu_to_char(change.start);
	let end = rope.utf16_cu_to_char(change.end);
	rope.remove(start..end);
	rope.insert(start, &change.text);
	Ok(())
}

impl Default for Doc {
	fn default() -> Self {
		Self::new("")
	}
}

impl PartialEq for Doc {
	fn eq(&self, other: &Self) -> bool {
		self.rope == other.rope
	}
}

impl Eq for Doc {}

impl fmt::Display for Doc {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.rope, f)
	}
}

impl fmt::Debug for Doc {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Doc").field(&self.to_string()).finish()
	}
}

impl From<&str> for Doc {
	fn from(text: &str) -> Self {
		Self::new(text)
	}
}

impl From<String> for Doc {
	fn from(text: String) -> Self {
		Self::new(&text)
	}
}
