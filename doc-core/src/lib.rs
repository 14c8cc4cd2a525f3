//! # docsync-core
//!
//! Pure logic for docsync (no I/O, instant tests).
//!
//! This crate implements the state machine and algorithms for document
//! synchronization without any network or timer I/O, enabling fast unit
//! tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce
//! output without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, debounce timers, surface mutation) is
//! performed by `doc-client`, which interprets the actions produced by
//! the [`session::Session`] state machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod content;
pub mod morph;
pub mod session;

pub use batch::{FlushAlways, FlushPolicy, HoldTrailingWhitespace, PatchBatch};
pub use content::{ApplyError, ContentBuffer};
pub use morph::diff_replace;
pub use session::{Session, SessionAction, SyncPhase, RESET_NUDGE_AFTER};
