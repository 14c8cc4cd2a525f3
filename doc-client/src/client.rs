//! BufferClient - the read-write synchronization session.
//!
//! This module provides [`BufferClient`], which keeps an editable
//! surface consistent with an authoritative server-held document.
//!
//! # Architecture
//!
//! BufferClient uses a pure state machine (from doc-core) for protocol
//! logic and interprets the actions to perform actual I/O via the
//! [`Transport`] trait and [`Surface`] mutation.
//!
//! ```text
//! Editor surface → BufferClient → Transport → Network
//!                      ↓
//!                 doc-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docsync_client::{BufferClient, SessionConfig, MockSurface, MockTransport};
//! use docsync_types::{DocumentId, Operation};
//!
//! let config = SessionConfig::new(DocumentId::new("report"), "markdown".into());
//! let client = BufferClient::open(MockTransport::new(), config).await?;
//! client.bind_surface(MockSurface::new()).await?;
//!
//! client.record_local_edit(Operation::insert_at(0, "hello"));
//! client.run().await?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use doc_core::{
    ContentBuffer, FlushPolicy, HoldTrailingWhitespace, PatchBatch, Session, SessionAction,
};
use doc_types::{Capability, DocumentId, Format, Operation, Patch, ProtocolError, Version};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::batcher::DebounceTimer;
use crate::surface::{Surface, SurfaceError};
use crate::transport::{Transport, TransportError};

/// The default debounce window for outgoing patches.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Default bound on reset requests issued without a reset arriving.
pub const MAX_RESET_REQUESTS: u32 = 8;

/// Callback handed full document content.
pub(crate) type ContentCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The document channel could not be opened.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Wire encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The surface refused an edit.
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// A projection target rejected a reconciliation.
    #[error("reconcile error: {0}")]
    Reconcile(#[from] crate::projection::ReconcileError),

    /// Reset recovery is not making progress. Fatal: the owner decides
    /// whether and when to recreate the session.
    #[error("synchronization lost after {attempts} reset requests")]
    SyncLost {
        /// Reset requests issued since the last successful reset.
        attempts: u32,
    },

    /// A session is already open for the document.
    #[error("session already open for document {0}")]
    SessionOpen(DocumentId),
}

/// Configuration for one synchronization session.
#[derive(Clone)]
pub struct SessionConfig {
    /// The document to synchronize.
    pub document: DocumentId,
    /// The content format the server should serialize as.
    pub format: Format,
    /// Debounce window for coalescing local edits.
    pub debounce_window: Duration,
    /// Bound on reset requests issued without a reset arriving.
    pub max_reset_requests: u32,
    /// Policy deciding whether an expired debounce window flushes.
    pub flush_policy: Arc<dyn FlushPolicy>,
}

impl SessionConfig {
    /// Create a configuration with default batching behavior.
    pub fn new(document: DocumentId, format: Format) -> Self {
        Self {
            document,
            format,
            debounce_window: DEBOUNCE_WINDOW,
            max_reset_requests: MAX_RESET_REQUESTS,
            flush_policy: Arc::new(HoldTrailingWhitespace),
        }
    }

    /// Set the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the bound on unanswered reset requests.
    pub fn with_max_reset_requests(mut self, max: u32) -> Self {
        self.max_reset_requests = max;
        self
    }

    /// Swap the flush policy.
    pub fn with_flush_policy(mut self, policy: impl FlushPolicy + 'static) -> Self {
        self.flush_policy = Arc::new(policy);
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("document", &self.document)
            .field("format", &self.format)
            .field("debounce_window", &self.debounce_window)
            .field("max_reset_requests", &self.max_reset_requests)
            .finish_non_exhaustive()
    }
}

/// The read-write synchronization client for one document.
///
/// Owns the session's version, content mirror, and pending edits; feeds
/// local edits out as debounced patches and applies inbound patches to
/// the bound surface. Clones share the same session.
pub struct BufferClient<T: Transport> {
    inner: Arc<BufferInner<T>>,
}

struct BufferInner<T> {
    config: SessionConfig,
    transport: T,
    session: Mutex<Session>,
    content: Mutex<ContentBuffer>,
    batch: StdMutex<PatchBatch>,
    suppress_echo: AtomicBool,
    surface: StdMutex<Option<Box<dyn Surface>>>,
    subscribers: StdMutex<Vec<ContentCallback>>,
    timer: StdMutex<DebounceTimer>,
}

impl<T: Transport> Clone for BufferClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> BufferClient<T> {
    /// Open a read-write session for the configured document.
    ///
    /// The session starts at version 0 with empty content until the
    /// first reset patch arrives.
    pub async fn open(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        transport
            .open(&config.document, Capability::Write, &config.format)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(BufferInner {
                config,
                transport,
                session: Mutex::new(Session::new()),
                content: Mutex::new(ContentBuffer::new()),
                batch: StdMutex::new(PatchBatch::new()),
                suppress_echo: AtomicBool::new(false),
                surface: StdMutex::new(None),
                subscribers: StdMutex::new(Vec::new()),
                timer: StdMutex::new(DebounceTimer::new()),
            }),
        })
    }

    /// Bind the editable surface. Required before patches can flow.
    ///
    /// A surface bound after content has already arrived is seeded with
    /// the current content.
    pub async fn bind_surface(&self, surface: impl Surface + 'static) -> Result<(), ClientError> {
        let mut surface: Box<dyn Surface> = Box::new(surface);

        let content = self.inner.content.lock().await;
        if !content.is_empty() {
            self.mutate_surface(surface.as_mut(), |surface| {
                surface.apply_replace(0, surface.len_chars(), content.as_str())
            })?;
        }

        *self.inner.surface.lock().unwrap() = Some(surface);
        Ok(())
    }

    /// Register a callback invoked with full content after every reset
    /// application.
    pub fn subscribe(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push(Box::new(callback));
    }

    /// Record a local edit reported by the surface.
    ///
    /// Synchronous; the edit joins the pending batch and restarts the
    /// debounce timer. Edits reported while the client itself is
    /// mutating the surface are echoes and are dropped.
    pub fn record_local_edit(&self, op: Operation) {
        if self.inner.suppress_echo.load(Ordering::SeqCst) {
            tracing::trace!(document = %self.inner.config.document, "dropping echoed edit");
            return;
        }

        self.inner.batch.lock().unwrap().push(op);
        self.restart_debounce();
    }

    /// Send the pending batch now, bypassing the flush policy.
    ///
    /// Sends `{version: local, ops}` and then advances the local
    /// version. On failure the batch and version are left untouched so a
    /// later flush can retry.
    pub async fn flush_pending(&self) -> Result<(), ClientError> {
        let ops = self.inner.batch.lock().unwrap().take();
        if ops.is_empty() {
            return Ok(());
        }

        let mut session = self.inner.session.lock().await;
        let patch = Patch::new(session.version(), ops);
        let bytes = match patch.to_bytes() {
            Ok(bytes) => bytes,
            Err(error) => {
                self.inner.batch.lock().unwrap().restore(patch.ops);
                return Err(error.into());
            }
        };

        match self.inner.transport.send(&bytes).await {
            Ok(()) => {
                tracing::debug!(
                    document = %self.inner.config.document,
                    version = %patch.version,
                    ops = patch.ops.len(),
                    "sent patch"
                );
                session.record_local_flush();
                Ok(())
            }
            Err(error) => {
                self.inner.batch.lock().unwrap().restore(patch.ops);
                Err(error.into())
            }
        }
    }

    /// Handle one inbound message.
    ///
    /// Version and structural anomalies are resolved internally via
    /// reset requests; only terminal conditions ([`ClientError::SyncLost`],
    /// transport failures) surface.
    pub async fn handle_message(&self, bytes: &[u8]) -> Result<(), ClientError> {
        match Patch::from_bytes(bytes) {
            Ok(patch) => self.handle_patch(patch).await,
            Err(error) => {
                tracing::warn!(
                    document = %self.inner.config.document,
                    %error,
                    "malformed inbound message, requesting reset"
                );
                self.inner.session.lock().await.begin_reset_recovery();
                self.request_reset().await
            }
        }
    }

    /// Handle one inbound patch (already decoded).
    pub async fn handle_patch(&self, patch: Patch) -> Result<(), ClientError> {
        let actions = {
            let mut session = self.inner.session.lock().await;
            let (next, actions) = session.clone().on_patch(patch);
            *session = next;
            actions
        };

        for action in actions {
            match action {
                SessionAction::ReplaceAll { content, version } => {
                    self.apply_replace_all(content, version).await?;
                }
                SessionAction::ApplyOps { ops, version } => {
                    self.apply_ops(ops, version).await?;
                }
                SessionAction::RequestReset => {
                    self.request_reset().await?;
                }
                SessionAction::Discard { version } => {
                    tracing::debug!(
                        document = %self.inner.config.document,
                        %version,
                        "discarding patch while awaiting reset"
                    );
                }
            }
        }
        Ok(())
    }

    /// Pump inbound messages until the channel closes.
    pub async fn run(&self) -> Result<(), ClientError> {
        loop {
            match self.inner.transport.recv().await {
                Ok(bytes) => self.handle_message(&bytes).await?,
                Err(TransportError::Closed) => return Ok(()),
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Close the session: cancel the debounce timer, discard pending
    /// edits unflushed, unbind the surface, close the transport.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.inner.timer.lock().unwrap().cancel();
        self.inner.batch.lock().unwrap().clear();
        *self.inner.surface.lock().unwrap() = None;
        self.inner.transport.close().await?;
        Ok(())
    }

    /// The current local version.
    pub async fn version(&self) -> Version {
        self.inner.session.lock().await.version()
    }

    /// Whether version continuity currently holds.
    pub async fn is_synced(&self) -> bool {
        self.inner.session.lock().await.is_synced()
    }

    /// The current local content.
    pub async fn content(&self) -> String {
        self.inner.content.lock().await.as_str().to_string()
    }

    /// Number of pending (unflushed) local operations.
    pub fn pending_ops(&self) -> usize {
        self.inner.batch.lock().unwrap().len()
    }

    /// The document this session synchronizes.
    pub fn document(&self) -> &DocumentId {
        &self.inner.config.document
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Mutate the surface with echo suppression held for exactly the
    /// duration of the call.
    fn mutate_surface(
        &self,
        surface: &mut dyn Surface,
        mutate: impl FnOnce(&mut dyn Surface) -> Result<(), SurfaceError>,
    ) -> Result<(), SurfaceError> {
        self.inner.suppress_echo.store(true, Ordering::SeqCst);
        let result = mutate(surface);
        self.inner.suppress_echo.store(false, Ordering::SeqCst);
        result
    }

    fn restart_debounce(&self) {
        let weak = Arc::downgrade(&self.inner);
        let window = self.inner.config.debounce_window;
        self.inner
            .timer
            .lock()
            .unwrap()
            .restart(window, debounce_expired(weak));
    }

    /// Timer expiry: consult the flush policy, then flush.
    async fn debounce_expired(&self) {
        let should_flush = {
            let batch = self.inner.batch.lock().unwrap();
            self.inner.config.flush_policy.should_flush(batch.ops())
        };

        if !should_flush {
            // Held edits ride along with the next flush; the timer is
            // not restarted.
            tracing::debug!(
                document = %self.inner.config.document,
                "debounce expired, holding pending edits"
            );
            return;
        }

        if let Err(error) = self.flush_pending().await {
            tracing::warn!(
                document = %self.inner.config.document,
                %error,
                "debounce flush failed, edits kept for retry"
            );
        }
    }

    async fn apply_replace_all(
        &self,
        new_content: String,
        version: Version,
    ) -> Result<(), ClientError> {
        let mut content = self.inner.content.lock().await;

        let surface_result = {
            let mut surface = self.inner.surface.lock().unwrap();
            match surface.as_deref_mut() {
                Some(surface) => self.mutate_surface(surface, |surface| {
                    surface.apply_replace(0, surface.len_chars(), &new_content)
                }),
                None => Ok(()),
            }
        };

        if let Err(error) = surface_result {
            tracing::warn!(
                document = %self.inner.config.document,
                %error,
                "surface rejected reset snapshot, requesting reset"
            );
            drop(content);
            self.inner.session.lock().await.begin_reset_recovery();
            return self.request_reset().await;
        }

        content.replace_all(new_content);
        tracing::debug!(
            document = %self.inner.config.document,
            %version,
            "applied reset snapshot"
        );
        self.inner.session.lock().await.note_recovered();
        self.notify_subscribers(content.as_str());
        Ok(())
    }

    async fn apply_ops(&self, ops: Vec<Operation>, version: Version) -> Result<(), ClientError> {
        let mut content = self.inner.content.lock().await;

        if let Err(error) = content.apply(&ops) {
            tracing::warn!(
                document = %self.inner.config.document,
                %version,
                %error,
                "patch does not fit local content, requesting reset"
            );
            drop(content);
            self.inner.session.lock().await.begin_reset_recovery();
            return self.request_reset().await;
        }

        let surface_result = {
            let mut surface = self.inner.surface.lock().unwrap();
            match surface.as_deref_mut() {
                Some(surface) => self.mutate_surface(surface, |surface| {
                    for op in &ops {
                        surface.apply_replace(op.from, op.to, &op.insert)?;
                    }
                    Ok(())
                }),
                None => Ok(()),
            }
        };

        match surface_result {
            Ok(()) => {
                tracing::debug!(
                    document = %self.inner.config.document,
                    %version,
                    ops = ops.len(),
                    "applied patch"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    document = %self.inner.config.document,
                    %error,
                    "surface rejected patch, requesting reset"
                );
                drop(content);
                self.inner.session.lock().await.begin_reset_recovery();
                self.request_reset().await
            }
        }
    }

    /// Send `{version: 0}`, escalating to [`ClientError::SyncLost`] when
    /// recovery is no longer making progress.
    async fn request_reset(&self) -> Result<(), ClientError> {
        let attempts = self.inner.session.lock().await.reset_requests();
        if attempts > self.inner.config.max_reset_requests {
            tracing::error!(
                document = %self.inner.config.document,
                attempts,
                "reset requests are not making progress"
            );
            return Err(ClientError::SyncLost { attempts });
        }

        let bytes = Patch::reset_request().to_bytes()?;
        match self.inner.transport.send(&bytes).await {
            Ok(()) => {
                tracing::debug!(document = %self.inner.config.document, "requested reset");
                Ok(())
            }
            Err(error) => {
                tracing::error!(
                    document = %self.inner.config.document,
                    %error,
                    "failed to send reset request"
                );
                Err(ClientError::SyncLost { attempts })
            }
        }
    }

    fn notify_subscribers(&self, content: &str) {
        for callback in self.inner.subscribers.lock().unwrap().iter() {
            callback(content);
        }
    }
}

/// Expiry future for the debounce timer; holds only a weak reference so
/// an armed timer does not keep a closed session alive.
async fn debounce_expired<T: Transport + 'static>(weak: Weak<BufferInner<T>>) {
    if let Some(inner) = weak.upgrade() {
        BufferClient { inner }.debounce_expired().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MockSurface;
    use crate::transport::MockTransport;
    use doc_core::FlushAlways;
    use std::time::Duration;

    fn test_config() -> SessionConfig {
        SessionConfig::new(DocumentId::new("test-doc"), "markdown".into())
    }

    async fn open_client() -> (BufferClient<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let client = BufferClient::open(transport.clone(), test_config())
            .await
            .unwrap();
        (client, transport)
    }

    /// Client with a bound surface, synchronized to "abc" at version 5.
    async fn synced_client() -> (BufferClient<MockTransport>, MockTransport, MockSurface) {
        let (client, transport) = open_client().await;
        let surface = MockSurface::new();
        client.bind_surface(surface.clone()).await.unwrap();

        client
            .handle_patch(Patch::reset(Version::new(5), "abc"))
            .await
            .unwrap();
        assert_eq!(client.content().await, "abc");
        (client, transport, surface)
    }

    // ===========================================
    // Open / Configuration Tests
    // ===========================================

    #[tokio::test]
    async fn open_subscribes_with_write_capability() {
        let (client, transport) = open_client().await;

        let (document, capability, format) = transport.opened_as().unwrap();
        assert_eq!(document, DocumentId::new("test-doc"));
        assert_eq!(capability, Capability::Write);
        assert_eq!(format, Format::new("markdown"));
        assert_eq!(client.version().await, Version::zero());
        assert_eq!(client.content().await, "");
    }

    #[tokio::test]
    async fn open_failure_is_a_connection_error() {
        let transport = MockTransport::new();
        transport.fail_next_open("refused");

        let result = BufferClient::open(transport, test_config()).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }

    #[test]
    fn config_builder_pattern() {
        let config = test_config()
            .with_debounce_window(Duration::from_millis(50))
            .with_max_reset_requests(2)
            .with_flush_policy(FlushAlways);

        assert_eq!(config.debounce_window, Duration::from_millis(50));
        assert_eq!(config.max_reset_requests, 2);
        assert!(config.flush_policy.should_flush(&[Operation::insert_at(0, " ")]));
    }

    // ===========================================
    // Inbound State Machine Tests
    // ===========================================

    #[tokio::test]
    async fn reset_patch_replaces_content_and_surface() {
        let (client, _transport, surface) = synced_client().await;

        assert_eq!(client.version().await, Version::new(5));
        assert_eq!(surface.text(), "abc");
    }

    #[tokio::test]
    async fn sequential_patch_applies_to_content_and_surface() {
        let (client, _transport, surface) = synced_client().await;

        client
            .handle_patch(Patch::new(
                Version::new(6),
                vec![Operation::new(1, 2, "X")],
            ))
            .await
            .unwrap();

        assert_eq!(client.content().await, "aXc");
        assert_eq!(surface.text(), "aXc");
        assert_eq!(client.version().await, Version::new(6));
    }

    #[tokio::test]
    async fn version_gap_requests_reset_without_mutation() {
        let (client, transport, surface) = synced_client().await;

        client
            .handle_patch(Patch::new(
                Version::new(8),
                vec![Operation::new(1, 2, "X")],
            ))
            .await
            .unwrap();

        // No content mutation, reset requested, diverged.
        assert_eq!(client.content().await, "abc");
        assert_eq!(surface.text(), "abc");
        assert_eq!(client.version().await, Version::new(5));
        assert!(!client.is_synced().await);
        assert_eq!(transport.last_sent_patch(), Some(Patch::reset_request()));
    }

    #[tokio::test]
    async fn diverged_session_discards_until_reset() {
        let (client, _transport, _surface) = synced_client().await;

        client
            .handle_patch(Patch::new(Version::new(8), vec![Operation::new(1, 2, "X")]))
            .await
            .unwrap();
        client
            .handle_patch(Patch::new(Version::new(9), vec![Operation::new(0, 1, "Y")]))
            .await
            .unwrap();
        assert_eq!(client.content().await, "abc");

        client
            .handle_patch(Patch::reset(Version::new(9), "resynced"))
            .await
            .unwrap();
        assert_eq!(client.content().await, "resynced");
        assert_eq!(client.version().await, Version::new(9));
        assert!(client.is_synced().await);
    }

    #[tokio::test]
    async fn reset_is_idempotent_on_a_consistent_session() {
        let (client, _transport, surface) = synced_client().await;

        client
            .handle_patch(Patch::reset(Version::new(5), "abc"))
            .await
            .unwrap();

        assert_eq!(client.content().await, "abc");
        assert_eq!(surface.text(), "abc");
        assert_eq!(client.version().await, Version::new(5));
        assert!(client.is_synced().await);
    }

    #[tokio::test]
    async fn malformed_message_requests_reset() {
        let (client, transport, _surface) = synced_client().await;

        client.handle_message(b"not json").await.unwrap();

        assert!(!client.is_synced().await);
        assert_eq!(transport.last_sent_patch(), Some(Patch::reset_request()));
    }

    #[tokio::test]
    async fn patch_that_does_not_fit_requests_reset() {
        let (client, transport, surface) = synced_client().await;

        // Range beyond "abc": local content has diverged from the server.
        client
            .handle_patch(Patch::new(
                Version::new(6),
                vec![Operation::new(0, 10, "X")],
            ))
            .await
            .unwrap();

        assert_eq!(client.content().await, "abc");
        assert_eq!(surface.text(), "abc");
        assert!(!client.is_synced().await);
        assert_eq!(transport.last_sent_patch(), Some(Patch::reset_request()));
    }

    #[tokio::test]
    async fn run_pumps_queued_patches_until_closed() {
        let (client, transport) = open_client().await;
        client.bind_surface(MockSurface::new()).await.unwrap();

        transport.queue_patch(&Patch::reset(Version::zero(), "hello"));
        transport.queue_patch(&Patch::new(
            Version::new(1),
            vec![Operation::insert_at(5, " world")],
        ));

        client.run().await.unwrap();

        assert_eq!(client.content().await, "hello world");
        assert_eq!(client.version().await, Version::new(1));
    }

    #[tokio::test]
    async fn subscriber_sees_initial_content_after_first_reset() {
        let (client, _transport) = open_client().await;
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.subscribe(move |content| sink.lock().unwrap().push(content.to_string()));

        client
            .handle_patch(Patch::reset(Version::zero(), "initial"))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().clone(), vec!["initial".to_string()]);
    }

    #[tokio::test]
    async fn late_bound_surface_is_seeded_with_content() {
        let (client, _transport) = open_client().await;
        client
            .handle_patch(Patch::reset(Version::zero(), "already here"))
            .await
            .unwrap();

        let surface = MockSurface::new();
        client.bind_surface(surface.clone()).await.unwrap();

        assert_eq!(surface.text(), "already here");
    }

    // ===========================================
    // Echo Suppression Tests
    // ===========================================

    #[tokio::test]
    async fn programmatic_mutation_is_not_recorded_as_local_edit() {
        let (client, _transport) = open_client().await;

        // Wire the surface's change listener back into the client, the
        // way an editor embedding would.
        let surface = MockSurface::new();
        let echo = client.clone();
        surface.on_apply(move |op| echo.record_local_edit(op));
        client.bind_surface(surface.clone()).await.unwrap();

        client
            .handle_patch(Patch::reset(Version::zero(), "abc"))
            .await
            .unwrap();
        client
            .handle_patch(Patch::new(Version::new(1), vec![Operation::new(1, 2, "X")]))
            .await
            .unwrap();

        // The surface echoed both mutations; none became pending edits.
        assert_eq!(surface.applied().len(), 2);
        assert_eq!(client.pending_ops(), 0);
    }

    #[tokio::test]
    async fn genuine_local_edits_are_still_recorded() {
        let (client, _transport, _surface) = synced_client().await;

        client.record_local_edit(Operation::insert_at(3, "d"));
        assert_eq!(client.pending_ops(), 1);
    }

    // ===========================================
    // Batching / Flush Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_patch() {
        let (client, transport, _surface) = synced_client().await;

        client.record_local_edit(Operation::insert_at(3, "d"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.record_local_edit(Operation::insert_at(4, "e"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.record_local_edit(Operation::insert_at(5, "f"));

        tokio::time::sleep(Duration::from_millis(400)).await;

        let sent = transport.sent_patches();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].version, Version::new(5));
        assert_eq!(
            sent[0].ops,
            vec![
                Operation::insert_at(3, "d"),
                Operation::insert_at(4, "e"),
                Operation::insert_at(5, "f"),
            ]
        );
        assert_eq!(client.version().await, Version::new(6));
        assert_eq!(client.pending_ops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_whitespace_edit_holds_the_flush() {
        let (client, transport, _surface) = synced_client().await;

        client.record_local_edit(Operation::insert_at(3, "d"));
        client.record_local_edit(Operation::insert_at(4, " "));

        tokio::time::sleep(Duration::from_millis(400)).await;

        // Held: nothing sent, edits still pending, version unchanged.
        assert!(transport.sent_patches().is_empty());
        assert_eq!(client.pending_ops(), 2);
        assert_eq!(client.version().await, Version::new(5));

        // A later non-whitespace edit flushes everything in order.
        client.record_local_edit(Operation::insert_at(5, "e"));
        tokio::time::sleep(Duration::from_millis(400)).await;

        let sent = transport.sent_patches();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].ops.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_always_policy_sends_whitespace() {
        let transport = MockTransport::new();
        let client = BufferClient::open(
            transport.clone(),
            test_config().with_flush_policy(FlushAlways),
        )
        .await
        .unwrap();

        client.record_local_edit(Operation::insert_at(0, " "));
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(transport.sent_patches().len(), 1);
    }

    #[tokio::test]
    async fn explicit_flush_bypasses_policy_and_advances_version() {
        let (client, transport, _surface) = synced_client().await;

        client.record_local_edit(Operation::insert_at(3, " "));
        client.flush_pending().await.unwrap();

        let sent = transport.sent_patches();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].version, Version::new(5));
        assert_eq!(client.version().await, Version::new(6));
    }

    #[tokio::test]
    async fn flush_with_nothing_pending_is_a_no_op() {
        let (client, transport, _surface) = synced_client().await;

        client.flush_pending().await.unwrap();
        assert!(transport.sent_patches().is_empty());
        assert_eq!(client.version().await, Version::new(5));
    }

    #[tokio::test]
    async fn failed_flush_keeps_edits_and_version() {
        let (client, transport, _surface) = synced_client().await;
        transport.fail_next_send("socket gone");

        client.record_local_edit(Operation::insert_at(3, "d"));
        let result = client.flush_pending().await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(client.pending_ops(), 1);
        assert_eq!(client.version().await, Version::new(5));

        // Retry succeeds and drains the batch.
        client.flush_pending().await.unwrap();
        assert_eq!(client.pending_ops(), 0);
        assert_eq!(client.version().await, Version::new(6));
    }

    // ===========================================
    // Reset Recovery / SyncLost Tests
    // ===========================================

    #[tokio::test]
    async fn failed_reset_request_send_is_sync_lost() {
        let (client, transport, _surface) = synced_client().await;
        transport.fail_next_send("socket gone");

        let result = client
            .handle_patch(Patch::new(Version::new(9), vec![Operation::new(0, 1, "X")]))
            .await;

        assert!(matches!(result, Err(ClientError::SyncLost { .. })));
    }

    #[tokio::test]
    async fn repeated_unanswered_resets_become_sync_lost() {
        let transport = MockTransport::new();
        let client = BufferClient::open(
            transport.clone(),
            test_config().with_max_reset_requests(1),
        )
        .await
        .unwrap();

        // Each malformed message forces a fresh reset request.
        client.handle_message(b"garbage").await.unwrap();
        let result = client.handle_message(b"garbage").await;

        assert!(matches!(
            result,
            Err(ClientError::SyncLost { attempts: 2 })
        ));
    }

    // ===========================================
    // Close / Teardown Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn close_discards_pending_edits_without_flushing() {
        let (client, transport, _surface) = synced_client().await;

        client.record_local_edit(Operation::insert_at(3, "d"));
        client.close().await.unwrap();

        assert_eq!(client.pending_ops(), 0);
        assert!(!transport.is_open());

        // The armed debounce must not fire after close.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(transport.sent_patches().is_empty());
    }
}
