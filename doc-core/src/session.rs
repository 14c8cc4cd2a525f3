//! Version state machine for one synchronization session.
//!
//! This module provides a pure, side-effect-free state machine for the
//! inbound half of the protocol. The state machine takes received patches
//! as input and produces a new state plus a list of actions to execute.
//!
//! The actual I/O (surface mutation, sending reset requests) is performed
//! by doc-client, not by this module. This enables instant unit testing
//! without network mocks.
//!
//! The transition table:
//!
//! ```text
//! Synced        + reset patch          -> replace all, adopt patch version
//! Synced        + version == local + 1 -> apply ops, adopt patch version
//! Synced        + any other version    -> request reset, AwaitingReset
//! AwaitingReset + reset patch          -> replace all, adopt patch version, Synced
//! AwaitingReset + non-reset            -> discard, stay AwaitingReset
//! ```
//!
//! A gap is never waited out or reordered: any non-sequential version is
//! treated as unrecoverable locally and answered with a reset request.

use doc_types::{Operation, Patch, Version};

/// How many patches may be discarded while awaiting a reset before the
/// reset request is re-issued.
pub const RESET_NUDGE_AFTER: u32 = 16;

/// Which half of the recovery protocol the session is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Version continuity holds; sequential patches apply.
    Synced,
    /// A reset has been requested; everything but a reset patch is
    /// discarded.
    AwaitingReset {
        /// Patches discarded since the reset was requested.
        discarded: u32,
    },
}

/// Pure per-session protocol state - NO I/O, just transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    version: Version,
    phase: SyncPhase,
    /// Reset requests issued since the last successful reset.
    reset_requests: u32,
}

impl Session {
    /// Create a session at version 0, in sync, with no content yet.
    pub fn new() -> Self {
        Self {
            version: Version::zero(),
            phase: SyncPhase::Synced,
            reset_requests: 0,
        }
    }

    /// The current local version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether version continuity currently holds.
    pub fn is_synced(&self) -> bool {
        matches!(self.phase, SyncPhase::Synced)
    }

    /// Reset requests issued since the last successful reset.
    ///
    /// The driver compares this against its configured bound to decide
    /// when recovery has stopped making progress.
    pub fn reset_requests(&self) -> u32 {
        self.reset_requests
    }

    /// Record that a locally authored patch was sent at the current
    /// version; the local version advances immediately.
    pub fn record_local_flush(&mut self) {
        self.version = self.version.next();
    }

    /// Force the session into reset recovery.
    ///
    /// Used by the driver for divergence the state machine cannot see
    /// itself: a sequential patch that does not fit the local content,
    /// a failed reconciliation, or a malformed message.
    pub fn begin_reset_recovery(&mut self) {
        self.phase = SyncPhase::AwaitingReset { discarded: 0 };
        self.reset_requests += 1;
    }

    /// Record that a reset snapshot was fully applied.
    ///
    /// Clears the reset-request count. Called by the driver only once
    /// the snapshot actually landed (surface replaced, target
    /// reconciled), so a reset that arrives but cannot be applied still
    /// counts toward the progress bound.
    pub fn note_recovered(&mut self) {
        self.reset_requests = 0;
    }

    /// Process a received patch and return the new state plus actions to
    /// execute.
    ///
    /// This is a pure function - no side effects. The caller (doc-client)
    /// is responsible for executing the returned actions.
    pub fn on_patch(self, patch: Patch) -> (Self, Vec<SessionAction>) {
        if patch.is_reset() {
            // The reset patch's declared version is authoritative,
            // whether 0 or a server-supplied value. The reset-request
            // count is cleared by the driver once the snapshot actually
            // applies, not here.
            let version = patch.version;
            let content = patch.ops.into_iter().next().map(|op| op.insert).unwrap_or_default();
            return (
                Self {
                    version,
                    phase: SyncPhase::Synced,
                    reset_requests: self.reset_requests,
                },
                vec![SessionAction::ReplaceAll { content, version }],
            );
        }

        match self.phase {
            SyncPhase::Synced => {
                if patch.version == self.version.next() {
                    (
                        Self {
                            version: patch.version,
                            ..self
                        },
                        vec![SessionAction::ApplyOps {
                            ops: patch.ops,
                            version: patch.version,
                        }],
                    )
                } else {
                    (
                        Self {
                            phase: SyncPhase::AwaitingReset { discarded: 0 },
                            reset_requests: self.reset_requests + 1,
                            ..self
                        },
                        vec![SessionAction::RequestReset],
                    )
                }
            }
            SyncPhase::AwaitingReset { discarded } => {
                let discarded = discarded + 1;
                let mut actions = vec![SessionAction::Discard {
                    version: patch.version,
                }];
                let mut reset_requests = self.reset_requests;
                // Still diverged after a stream of patches: nudge the
                // server again.
                if discarded % RESET_NUDGE_AFTER == 0 {
                    reset_requests += 1;
                    actions.push(SessionAction::RequestReset);
                }
                (
                    Self {
                        phase: SyncPhase::AwaitingReset { discarded },
                        reset_requests,
                        ..self
                    },
                    actions,
                )
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Actions to be executed by doc-client.
///
/// These are instructions, not side effects. The client interprets them
/// and performs the actual surface mutation and network sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Replace the entire content (reset patch arrived).
    ReplaceAll {
        /// The full document content.
        content: String,
        /// The version the reset declares.
        version: Version,
    },
    /// Apply sequential operations to the content and surface.
    ApplyOps {
        /// The operations, in application order.
        ops: Vec<Operation>,
        /// The version the patch advances to.
        version: Version,
    },
    /// Send a `{version: 0}` reset request to the server.
    RequestReset,
    /// Drop a patch received while awaiting a reset.
    Discard {
        /// The discarded patch's version.
        version: Version,
    },
}
