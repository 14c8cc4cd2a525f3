//! Versioned patches: ordered lists of range-replace operations.
//!
//! A patch is the only message exchanged on a document channel, in both
//! directions. Two distinguished forms exist alongside ordinary sequential
//! patches:
//!
//! - the **reset request** (`{version: 0}`, no ops), sent by a client to
//!   ask for a full resynchronization snapshot;
//! - the **reset patch** (a single op replacing `[0, 0)` with the entire
//!   document), sent by the server to resynchronize a diverged client.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Version};

/// A single range-replace operation.
///
/// Replaces the half-open character range `[from, to)` with `insert`.
/// `insert` may be empty (deletion) and the range may be empty
/// (insertion at `from`). Within one patch, each operation's offsets are
/// relative to the content state after the preceding operations of the
/// same patch have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Start of the replaced range (inclusive).
    pub from: usize,
    /// End of the replaced range (exclusive). Must be `>= from`.
    pub to: usize,
    /// Replacement text.
    pub insert: String,
}

impl Operation {
    /// Create a new operation.
    pub fn new(from: usize, to: usize, insert: impl Into<String>) -> Self {
        Self {
            from,
            to,
            insert: insert.into(),
        }
    }

    /// Create an insertion at the given position.
    pub fn insert_at(at: usize, insert: impl Into<String>) -> Self {
        Self::new(at, at, insert)
    }

    /// Create a deletion of the given range.
    pub fn delete(from: usize, to: usize) -> Self {
        Self::new(from, to, "")
    }
}

/// A versioned, ordered list of range-replace operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// The version this patch advances the document to (or, for a reset
    /// request, the sentinel 0).
    pub version: Version,
    /// The operations, in application order. Omitted on the wire when
    /// empty (the reset request form).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ops: Vec<Operation>,
}

impl Patch {
    /// Create a patch carrying the given operations.
    pub fn new(version: Version, ops: Vec<Operation>) -> Self {
        Self { version, ops }
    }

    /// The client-to-server request for a full resynchronization snapshot.
    pub fn reset_request() -> Self {
        Self {
            version: Version::zero(),
            ops: Vec::new(),
        }
    }

    /// A server-to-client reset patch carrying full document content.
    ///
    /// The declared version is authoritative: clients adopt it as their
    /// local version when applying the reset.
    pub fn reset(version: Version, content: impl Into<String>) -> Self {
        Self {
            version,
            ops: vec![Operation::insert_at(0, content)],
        }
    }

    /// Whether this is the distinguished reset patch: exactly one
    /// operation replacing the empty range at the start of the document.
    pub fn is_reset(&self) -> bool {
        self.ops.len() == 1 && self.ops[0].from == 0 && self.ops[0].to == 0
    }

    /// Serialize to JSON bytes for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Deserialization)
    }
}
