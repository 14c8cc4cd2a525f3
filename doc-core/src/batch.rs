//! Pending-operation batching for outgoing patches.
//!
//! Local edits are queued in a [`PatchBatch`] and coalesced into a single
//! outgoing patch when the debounce window (driven by doc-client) expires.
//! Operations are never reordered: a flush sends them exactly as recorded.
//!
//! Whether an expired window actually flushes is decided by a
//! [`FlushPolicy`]. The default [`HoldTrailingWhitespace`] policy skips
//! flushes whose last insert is nothing but whitespace, so trailing-
//! whitespace-only states are not sent to the server.

use doc_types::Operation;

/// Queue of operations recorded since the last flush.
#[derive(Debug, Clone, Default)]
pub struct PatchBatch {
    ops: Vec<Operation>,
}

impl PatchBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation. Order of recording is order of sending.
    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// The pending operations, in recording order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Remove and return all pending operations.
    pub fn take(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.ops)
    }

    /// Put operations back at the front of the batch (failed send).
    pub fn restore(&mut self, mut ops: Vec<Operation>) {
        ops.append(&mut self.ops);
        self.ops = ops;
    }

    /// Drop all pending operations.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

/// Decides whether an expired debounce window should flush the batch.
pub trait FlushPolicy: Send + Sync {
    /// Whether the pending operations should be sent now.
    ///
    /// Returning `false` leaves the operations queued; they ride along
    /// with the next flush.
    fn should_flush(&self, pending: &[Operation]) -> bool;
}

/// Hold the flush when the last pending insert is non-empty whitespace.
///
/// The heuristic is coarse: it also holds a space typed mid-sentence
/// until the next non-whitespace edit arrives. Swap in [`FlushAlways`]
/// via the session config to opt out.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldTrailingWhitespace;

impl FlushPolicy for HoldTrailingWhitespace {
    fn should_flush(&self, pending: &[Operation]) -> bool {
        match pending.last() {
            Some(op) => op.insert.is_empty() || !op.insert.trim().is_empty(),
            None => false,
        }
    }
}

/// Flush every expired window, whatever the pending operations are.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushAlways;

impl FlushPolicy for FlushAlways {
    fn should_flush(&self, pending: &[Operation]) -> bool {
        !pending.is_empty()
    }
}
