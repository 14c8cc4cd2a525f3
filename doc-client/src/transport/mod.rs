//! Transport abstraction for docsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying message channel (WebSocket, in-process, mock for testing).
//! A transport is scoped to one document: opening it subscribes to that
//! document's patch stream with a capability and content format.
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `open()` subscribes to a document's channel
//! - `send()` transmits patch bytes
//! - `recv()` receives patch bytes
//! - `close()` gracefully terminates
//!
//! Connection lifecycle (retry, backoff, authentication) is the
//! transport implementation's responsibility; the client only reacts to
//! its errors.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.open(&document, Capability::Write, &format).await?;
//! transport.send(&patch_bytes).await?;
//! let response = transport.recv().await?;
//! ```

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use doc_types::{Capability, DocumentId, Format};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The document channel could not be opened.
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// The channel is not open.
    #[error("not open")]
    NotOpen,

    /// The channel has closed.
    #[error("channel closed")]
    Closed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Transport trait for one document's bidirectional patch channel.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, in-process channel, mock, etc). Messages on one channel
/// are assumed delivered in send order; the protocol detects gaps but
/// never reorders.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to a document's patch stream.
    async fn open(
        &self,
        document: &DocumentId,
        capability: Capability,
        format: &Format,
    ) -> Result<(), TransportError>;

    /// Send patch bytes over the channel.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive patch bytes from the channel.
    ///
    /// Blocks until data is available or the channel closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if the channel is currently open.
    fn is_open(&self) -> bool;

    /// Close the channel gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
