use similar::TextDiff;
use std::iter::{Enumerate, Peekable};
use std::str::Chars;

/// One front-to-back change between two buffers, positioned in code points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextChange {
    Insert { at: usize, value: String },
    Delete { at: usize, len: usize },
}

/// Computes the code-point-level changes that turn `from` into `to`.
///
/// The returned changes are ordered front to back with positions relative to
/// `from`, which is the shape the editing core needs to emit one operation
/// per character.
pub fn diff(from: &str, to: &str) -> Vec<TextChange> {
    let diff = TextDiff::from_chars(from, to);
    let ops = diff.ops();

    let changes: Vec<TextChange> = {
        let mut builder = Vec::with_capacity(ops.len());
        let mut copy_to_index = 0usize;
        for change in ops.iter() {
            match change {
                similar::DiffOp::Equal { old_index, len, .. } => {
                    copy_to_index = old_index + len;
                    // Skip equal text.
                }
                similar::DiffOp::Delete {
                    old_index, old_len, ..
                } => {
                    builder.push(TextChange::Delete {
                        at: *old_index,
                        len: *old_len,
                    });
                }
                similar::DiffOp::Insert {
                    new_index, new_len, ..
                } => {
                    let mut to_cursor = CharCursor::new(to);
                    let mut new_text = String::new();
                    to_cursor.skip(*new_index);
                    to_cursor.copy_to_until(&mut new_text, new_index + new_len);
                    builder.push(TextChange::Insert {
                        at: copy_to_index,
                        value: new_text,
                    });
                }
                similar::DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    let mut to_cursor = CharCursor::new(to);
                    let mut new_text = String::new();
                    to_cursor.skip(*new_index);
                    to_cursor.copy_to_until(&mut new_text, new_index + new_len);
                    builder.push(TextChange::Delete {
                        at: *old_index,
                        len: *old_len,
                    });
                    builder.push(TextChange::Insert {
                        at: *old_index + *old_len,
                        value: new_text,
                    });
                }
            }
        }

        // Before we return this, double check it really is front-to-back.
        let mut last_pos = 0usize;
        for change in builder.iter() {
            match change {
                TextChange::Insert { at, .. } => {
                    assert!(last_pos <= *at, "The list of changes was misordered.");
                    last_pos = *at;
                }
                TextChange::Delete { at, len } => {
                    assert!(last_pos <= *at, "The list of changes was misordered.");
                    last_pos = at + len;
                }
            }
        }

        builder
    };

    changes
}

/// Applies a change list produced by [[diff]] to `text`.
pub fn apply_text_diff(text: &str, diff: &[TextChange]) -> String {
    // Assuming roughly the input's size seems like a fair bet.
    let mut output = String::with_capacity(text.len());
    let mut input_cursor = CharCursor::new(text);

    for change in diff {
        match change {
            TextChange::Insert { at, value } => {
                input_cursor.copy_to_until(&mut output, *at);
                output.push_str(value);
            }
            TextChange::Delete { at, len } => {
                input_cursor.copy_to_until(&mut output, *at);
                input_cursor.skip(*len);
            }
        }
    }
    input_cursor.copy_to(&mut output);

    output
}

struct CharCursor<'s> {
    iter: Peekable<Enumerate<Chars<'s>>>,
}

impl<'s> CharCursor<'s> {
    pub fn new(text: &'s str) -> Self {
        Self {
            iter: text.chars().enumerate().peekable(),
        }
    }

    pub fn skip(&mut self, len: usize) {
        for _i in 0..len {
            self.iter.next().expect("Skipped beyond end of cursor"); // Ignore these.
        }
    }

    pub fn copy_to_until(&mut self, target: &mut String, until_pos: usize) {
        while self
            .iter
            .peek()
            .filter(|(index, _)| *index < until_pos)
            .is_some()
        {
            let (_, next_char) = self.iter.next().expect("Copied beyond end of cursor");
            target.push(next_char);
        }
    }

    pub fn copy_to(self, target: &mut String) {
        for (_, next_char) in self.iter {
            target.push(next_char);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    // Triplets of small edits: plain ASCII, code-point-heavy text, line
    // endings, tabs, and the empty buffer.
    const SMALL_CHANGE_TEST_GROUPS: [[&str; 3]; 6] = [
        ["", "a", "ab"],
        [
            "The quick brown fox jumps over the lazy dog.",
            "The small brown fox hops over the lazy dog.",
            "The small brown fox hops quickly over the irritated camel.",
        ],
        [
            "The quick brown fox jumps over the lazy dog.",
            "The quick brown fox jumps over the lazy dog!",
            "The quick brown fox jumps over the lazy dog! ",
        ],
        ["caf\u{e9} au lait", "cafe au lait", "cafe con leche"],
        ["Line", "Line\n", "Line\r\n"],
        [
            "\tIndented line",
            "\tIndented line\t",
            "\tIndented line\twith\ttabs",
        ],
    ];

    #[test]
    fn diff_and_apply_small_changes() {
        // Do all possible transitions within each group.
        for (row, group) in SMALL_CHANGE_TEST_GROUPS.iter().enumerate() {
            for perm in group.iter().enumerate().permutations(2) {
                let (from_index, from) = perm[0];
                let (to_index, to) = perm[1];
                check_diff_and_apply(
                    from,
                    to,
                    &format!(
                        "Patching with input:\n    {row}:{from_index}: \"{from}\"\n -> {row}:{to_index}: \"{to}\""
                    ),
                );
            }
        }
    }

    #[test]
    fn diff_and_apply_distant_changes() {
        // Some changes across groups: initial value of one to the final of another.
        for perm in SMALL_CHANGE_TEST_GROUPS.iter().enumerate().permutations(2) {
            let (from_row, from_group) = perm[0];
            let (to_row, to_group) = perm[1];
            let from = from_group[0];
            let to = to_group[2];
            check_diff_and_apply(
                from,
                to,
                &format!(
                    "Patching with input:\n    {from_row}:0: \"{from}\"\n -> {to_row}:2: \"{to}\""
                ),
            );
        }
    }

    #[test]
    fn positions_are_code_points_not_bytes() {
        let from = "caf\u{e9}!";
        let to = "caf\u{e9}?!";
        let changes = diff(from, to);
        assert_eq!(
            changes,
            vec![TextChange::Insert {
                at: 4,
                value: "?".to_string()
            }]
        );
        assert_eq!(apply_text_diff(from, &changes), to);
    }

    fn check_diff_and_apply(from: &str, to: &str, error_context: &str) {
        let result = diff(from, to);
        assert_ne!(
            result,
            vec![],
            "Diff should not be empty.\n  Context: {error_context}"
        );
        let applied = apply_text_diff(from, &result);
        assert_eq!(applied, to, "{error_context}");
    }
}
