//! Local document content and patch application.
//!
//! [`ContentBuffer`] owns one session's copy of the document text and
//! applies patches transactionally: either every operation in a patch
//! applies, or the content is left untouched. Application captures
//! inverse operations so that a round-trip (apply, then apply the
//! inverse) restores the original content exactly.
//!
//! Offsets are character offsets, not byte offsets. Each operation's
//! offsets are interpreted against the content state after the preceding
//! operations of the same patch have been applied.

use doc_types::Operation;
use thiserror::Error;

/// Errors from applying operations to content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// An operation's range ends before it starts.
    #[error("inverted range: from {from} > to {to}")]
    InvertedRange {
        /// Start of the offending range.
        from: usize,
        /// End of the offending range.
        to: usize,
    },

    /// An operation's range extends past the end of the content.
    #[error("range [{from}, {to}) out of bounds for content of length {len}")]
    OutOfBounds {
        /// Start of the offending range.
        from: usize,
        /// End of the offending range.
        to: usize,
        /// Content length (in characters) the range was applied against.
        len: usize,
    },
}

/// One session's local copy of the document content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBuffer {
    text: String,
}

impl ContentBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding the given text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The current content.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Content length in characters.
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Apply a sequence of operations, left-to-right.
    ///
    /// All-or-nothing: the buffer is only mutated once every operation
    /// has validated and applied against a working copy.
    ///
    /// Returns the inverse operations, ordered so that applying them to
    /// the post-patch content restores the pre-patch content.
    pub fn apply(&mut self, ops: &[Operation]) -> Result<Vec<Operation>, ApplyError> {
        let mut work = self.text.clone();
        let mut inverses = Vec::with_capacity(ops.len());

        for op in ops {
            inverses.push(apply_one(&mut work, op)?);
        }

        self.text = work;
        // Undo runs back-to-front: each inverse is addressed against the
        // state its operation produced.
        inverses.reverse();
        Ok(inverses)
    }

    /// Replace the entire content (reset patch application).
    pub fn replace_all(&mut self, content: impl Into<String>) {
        self.text = content.into();
    }
}

/// Apply one operation to `text`, returning its inverse.
fn apply_one(text: &mut String, op: &Operation) -> Result<Operation, ApplyError> {
    if op.from > op.to {
        return Err(ApplyError::InvertedRange {
            from: op.from,
            to: op.to,
        });
    }

    let len = text.chars().count();
    if op.to > len {
        return Err(ApplyError::OutOfBounds {
            from: op.from,
            to: op.to,
            len,
        });
    }

    let start = byte_offset(text, op.from);
    let end = byte_offset(text, op.to);

    let removed = text[start..end].to_string();
    let inserted_chars = op.insert.chars().count();

    text.replace_range(start..end, &op.insert);

    // In the post-state, the inserted text occupies
    // [from, from + inserted_chars); restoring `removed` there undoes the
    // operation.
    Ok(Operation::new(op.from, op.from + inserted_chars, removed))
}

/// Byte offset of the character at `char_offset`; `text.len()` when the
/// offset is one past the last character.
fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
