use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::{Diff, DiffError, Doc, Replace};

/// Applies `changes` the other way: offsets re-based by earlier length deltas.
fn apply_rebased(text: &str, changes: &[Replace]) -> String {
	let mut out = text.to_string();
	let mut shift: isize = 0;
	for change in changes {
		let start = (change.start as isize + shift) as usize;
		let end = (change.end as isize + shift) as usize;
		out.replace_range(start..end, &change.text);
		shift += change.delta();
	}
	out
}

#[test]
fn edit_single_insert() {
	let doc = Doc::new("hello");
	let edited = doc.edit(&Replace::insert(5, "!").into()).unwrap();
	assert_eq!(edited.to_string(), "hello!");
	assert_eq!(doc.to_string(), "hello");
}

#[test]
fn edit_equal_length_entries_agree_with_rebased() {
	let changes = vec![Replace::new(0, 1, "X"), Replace::new(3, 4, "Y")];
	let edited = Doc::new("abcdef").edit(&Diff::new(changes.clone())).unwrap();
	assert_eq!(edited.to_string(), "XbcYef");
	assert_eq!(apply_rebased("abcdef", &changes), "XbcYef");
}

#[test]
fn edit_uses_offsets_verbatim() {
	// Sequential offsets: the second entry addresses the text left by the first.
	let changes = vec![Replace::new(0, 1, "XY"), Replace::new(3, 4, "Z")];
	let edited = Doc::new("abcdef").edit(&Diff::new(changes.clone())).unwrap();
	assert_eq!(edited.to_string(), "XYbZdef");
	assert_eq!(apply_rebased("abcdef", &changes), "XYbcZef");
}

#[test]
fn from_simultaneous_shifts_later_entries() {
	let changes = vec![Replace::new(0, 1, "XY"), Replace::new(3, 4, "Z")];
	let diff = Diff::from_simultaneous(changes.clone()).unwrap();
	assert_eq!(diff.changes()[1], Replace::new(4, 5, "Z"));
	assert_eq!(
		Doc::new("abcdef").edit(&diff).unwrap().to_string(),
		apply_rebased("abcdef", &changes)
	);
}

#[test]
fn from_simultaneous_handles_deletions() {
	let changes = vec![Replace::delete(0, 3), Replace::insert(4, "!"), Replace::new(5, 6, "")];
	let diff = Diff::from_simultaneous(changes).unwrap();
	assert_eq!(Doc::new("abcdef").edit(&diff).unwrap().to_string(), "d!e");
}

#[test]
fn from_simultaneous_rejects_overlap() {
	let err = Diff::from_simultaneous(vec![Replace::new(0, 3, "x"), Replace::new(2, 4, "y")])
		.unwrap_err();
	assert_eq!(
		err,
		DiffError::Overlapping {
			index: 1,
			start: 2,
			previous_end: 3,
		}
	);
}

#[test]
fn edit_counts_utf16_code_units() {
	let doc = Doc::new("a😀b");
	assert_eq!(doc.len_utf16(), 4);
	let edited = doc.edit(&Replace::insert(3, "X").into()).unwrap();
	assert_eq!(edited.to_string(), "a😀Xb");
	let deleted = doc.edit(&Replace::delete(1, 3).into()).unwrap();
	assert_eq!(deleted.to_string(), "ab");
}

#[test]
fn edit_rejects_out_of_bounds() {
	let err = Doc::new("abc")
		.edit(&Diff::new(vec![Replace::insert(3, "d"), Replace::new(2, 9, "")]))
		.unwrap_err();
	assert_eq!(
		err,
		DiffError::OutOfBounds {
			index: 1,
			end: 9,
			len: 4,
		}
	);
}

#[test]
fn edit_rejects_inverted_range() {
	let err = Doc::new("abc").edit(&Replace::new(2, 1, "").into()).unwrap_err();
	assert!(matches!(err, DiffError::Inverted { index: 0, .. }));
}

#[test]
fn replace_all_produces_target() {
	let doc = Doc::new("old text");
	let diff = doc.replace_all("new");
	assert_eq!(doc.edit(&diff).unwrap(), Doc::new("new"));
}

#[test]
fn equality_is_textual() {
	let built = Doc::new("ab").edit(&Replace::insert(2, "c").into()).unwrap();
	assert_eq!(built, Doc::new("abc"));
	assert_ne!(built, Doc::new("abd"));
}

#[test]
fn diff_wire_format() {
	let diff = Diff::from(Replace::insert(5, "!"));
	let json = serde_json::to_string(&diff).unwrap();
	assert_eq!(json, r#"[{"start":5,"end":5,"text":"!"}]"#);
	let back: Diff = serde_json::from_str(&json).unwrap();
	assert_eq!(back, diff);
}

fn diffs_for(base: &str, ops: &[(u8, u8, String)]) -> Vec<Diff> {
	let mut doc = Doc::new(base);
	let mut diffs = Vec::new();
	for (a, b, text) in ops {
		let len = doc.len_utf16();
		let start = *a as usize % (len + 1);
		let end = start + *b as usize % (len - start + 1);
		let diff = Diff::from(Replace::new(start, end, text.clone()));
		doc = doc.edit(&diff).unwrap();
		diffs.push(diff);
	}
	diffs
}

proptest! {
	#[test]
	fn flatten_matches_sequential_application(
		base in "[a-zé]{0,16}",
		ops in prop::collection::vec((any::<u8>(), any::<u8>(), "[a-z😀]{0,3}"), 0..10),
	) {
		let diffs = diffs_for(&base, &ops);
		let mut stepwise = Doc::new(&base);
		for diff in &diffs {
			stepwise = stepwise.edit(diff).unwrap();
		}
		let flat = Diff::flatten(diffs);
		prop_assert_eq!(Doc::new(&base).edit(&flat).unwrap(), stepwise);
	}
}
