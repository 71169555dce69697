/// Reasons a [`Diff`](crate::Diff) cannot be built or applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
	/// A replacement ends before it starts.
	#[error("replacement {index} is inverted: start {start} > end {end}")]
	Inverted {
		/// Position of the replacement in its diff.
		index: usize,
		/// Start offset in UTF-16 code units.
		start: usize,
		/// End offset in UTF-16 code units.
		end: usize,
	},
	/// A replacement reaches past the end of the text it applies to.
	#[error("replacement {index} ends at {end} but the text is {len} code units long")]
	OutOfBounds {
		/// Position of the replacement in its diff.
		index: usize,
		/// End offset in UTF-16 code units.
		end: usize,
		/// Length of the text in UTF-16 code units.
		len: usize,
	},
	/// Simultaneous replacements overlap or are not sorted left to right.
	#[error("replacement {index} starts at {start}, before the previous one ends at {previous_end}")]
	Overlapping {
		/// Position of the replacement in its diff.
		index: usize,
		/// Start offset in UTF-16 code units.
		start: usize,
		/// End offset of the preceding replacement.
		previous_end: usize,
	},
}
