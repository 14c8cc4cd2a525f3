//! Minimal full-content diff for projection targets.
//!
//! Read-only projections receive full content snapshots rather than raw
//! ranges; a target holding a flat representation can use
//! [`diff_replace`] to turn two snapshots into the one range-replace that
//! morphs the old state into the new, instead of rebuilding wholesale.

use doc_types::Operation;

/// Compute the minimal single range-replace turning `old` into `new`.
///
/// Trims the common character prefix and suffix; the remainder becomes
/// one operation in character offsets against `old`. Returns `None` when
/// the contents are already equal.
pub fn diff_replace(old: &str, new: &str) -> Option<Operation> {
    if old == new {
        return None;
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = old_chars
        .iter()
        .zip(new_chars.iter())
        .take_while(|(a, b)| a == b)
        .count();

    // The suffix must not overlap the prefix on either side.
    let max_suffix = old_chars.len().min(new_chars.len()) - prefix;
    let suffix = old_chars
        .iter()
        .rev()
        .zip(new_chars.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    let insert: String = new_chars[prefix..new_chars.len() - suffix].iter().collect();

    Some(Operation::new(prefix, old_chars.len() - suffix, insert))
}
