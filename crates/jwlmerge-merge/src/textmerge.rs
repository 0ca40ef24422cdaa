//! Line-level text merging for colliding rows.
//!
//! When two rows describe the same note, bookmark, or input field but carry
//! different text, neither side is discarded: the survivor's field is
//! replaced with a line diff of both versions so the user can reconcile by
//! hand afterwards.

use similar::{ChangeTag, TextDiff};

/// Merge a dropped row's text into the survivor's.
///
/// Returns the survivor's replacement text: a line diff (old first, new
/// second) with `  `/`- `/`+ ` prefixes. When the survivor's text is empty
/// the dropped text is adopted verbatim instead of rendering a one-sided
/// diff.
pub fn merge_text(old: &str, new: &str) -> String {
    if new.trim().is_empty() {
        return old.to_string();
    }

    let diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();
    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Equal => "  ",
            ChangeTag::Delete => "- ",
            ChangeTag::Insert => "+ ",
        };
        let line = change.value().trim_end_matches(['\n', '\r']);
        lines.push(format!("{prefix}{line}"));
    }
    lines.join("\n")
}
