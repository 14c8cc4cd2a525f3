//! Mock transport for testing.
//!
//! Allows queueing inbound patches and capturing sent messages for
//! verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use doc_types::{Capability, DocumentId, Format, Patch};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock transport for testing.
///
/// Allows queueing inbound patches and capturing sent messages for
/// verification. Clones share state, so a test can keep a handle while
/// the client owns another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    open: bool,
    opened_as: Option<(DocumentId, Capability, Format)>,
    sent_messages: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_open: Option<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes to be returned by the next `recv()` call.
    pub fn queue_response(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
    }

    /// Queue a patch, serialized, for the next `recv()` call.
    pub fn queue_patch(&self, patch: &Patch) {
        self.queue_response(patch.to_bytes().expect("patch serializes"));
    }

    /// Get all raw messages that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Get all sent messages, parsed as patches.
    pub fn sent_patches(&self) -> Vec<Patch> {
        self.sent_messages()
            .iter()
            .map(|bytes| Patch::from_bytes(bytes).expect("sent bytes parse as a patch"))
            .collect()
    }

    /// Get the last sent message, parsed as a patch.
    pub fn last_sent_patch(&self) -> Option<Patch> {
        self.sent_patches().pop()
    }

    /// The (document, capability, format) the channel was opened with.
    pub fn opened_as(&self) -> Option<(DocumentId, Capability, Format)> {
        let inner = self.inner.lock().unwrap();
        inner.opened_as.clone()
    }

    /// Cause the next open() to fail with the given error.
    pub fn fail_next_open(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_open = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_recv = Some(error.to_string());
    }

    /// Clear all state (messages, queue, channel).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        document: &DocumentId,
        capability: Capability,
        format: &Format,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_open.take() {
            return Err(TransportError::OpenFailed(error));
        }

        inner.open = true;
        inner.opened_as = Some((document.clone(), capability, format.clone()));
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.open {
            return Err(TransportError::NotOpen);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.open {
            return Err(TransportError::NotOpen);
        }

        if let Some(error) = inner.fail_next_recv.take() {
            return Err(TransportError::ReceiveFailed(error));
        }

        inner
            .receive_queue
            .pop_front()
            .ok_or(TransportError::Closed)
    }

    fn is_open(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.open
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.open = false;
        Ok(())
    }
}
