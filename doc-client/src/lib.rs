//! # docsync-client
//!
//! Client library for the docsync document synchronization protocol.
//!
//! This is the crate applications use to keep an editable surface or a
//! read-only projection synchronized with an authoritative server-held
//! document.
//!
//! ## Features
//!
//! - **Versioned patching**: monotonic versions with reset-based recovery
//! - **Patch batching**: debounced coalescing of keystroke-level edits
//! - **Transport abstraction**: pluggable transport layer (mock included)
//! - **Pure state machine**: uses doc-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use docsync_client::{BufferClient, MockSurface, MockTransport, SessionConfig};
//! use docsync_types::DocumentId;
//!
//! let config = SessionConfig::new(DocumentId::new("report"), "markdown".into());
//! let client = BufferClient::open(MockTransport::new(), config).await?;
//! client.bind_surface(MockSurface::new()).await?;
//!
//! // Feed local edits; they are debounced and flushed as one patch.
//! client.record_local_edit(Operation::insert_at(0, "hello"));
//!
//! // Pump inbound patches.
//! client.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batcher;
pub mod client;
pub mod manager;
pub mod projection;
pub mod surface;
pub mod transport;

pub use batcher::DebounceTimer;
pub use client::{BufferClient, ClientError, SessionConfig};
pub use manager::{ConnectionManager, DocSession};
pub use projection::{ProjectionClient, ProjectionTarget, ReconcileError, TextTarget};
pub use surface::{MockSurface, Surface, SurfaceError};
pub use transport::{MockTransport, Transport, TransportError};
