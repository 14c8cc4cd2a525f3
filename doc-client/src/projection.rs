//! ProjectionClient - the read-only synchronization session.
//!
//! A projection keeps a rendered target (a DOM-like tree, a preview
//! pane) synchronized with the server's content without ever
//! originating edits. Because the target is structured rather than a
//! flat string, inbound patches are folded into the client's content
//! mirror and the target is then reconciled against the newly computed
//! full content, morph-style.
//!
//! Reconciliation failures degrade gracefully: the attempted update is
//! discarded and a reset is requested, so the target shows a fresh
//! snapshot instead of crashing the caller.

use std::sync::{Arc, Mutex as StdMutex};

use doc_core::{diff_replace, ContentBuffer, Session, SessionAction};
use doc_types::{Capability, DocumentId, Operation, Patch, Version};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::client::{ClientError, ContentCallback, SessionConfig};
use crate::transport::{Transport, TransportError};

/// A target rejected a reconciliation.
#[derive(Debug, Clone, Error)]
#[error("reconciliation failed: {0}")]
pub struct ReconcileError(pub String);

/// A rendered representation reconciled from full content snapshots.
///
/// Implementations must be all-or-nothing: when `reconcile` returns an
/// error the target must be left as it was, so a stale-but-consistent
/// view is shown until the reset snapshot arrives.
pub trait ProjectionTarget: Send {
    /// Morph the target to represent `content`.
    fn reconcile(&mut self, content: &str) -> Result<(), ReconcileError>;
}

/// Flat-text reference target.
///
/// Morphs itself with the minimal range-replace between its current
/// text and the new content, rather than rebuilding wholesale.
#[derive(Debug, Clone, Default)]
pub struct TextTarget {
    content: ContentBuffer,
}

impl TextTarget {
    /// Create an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// The target's current text.
    pub fn text(&self) -> &str {
        self.content.as_str()
    }
}

impl ProjectionTarget for TextTarget {
    fn reconcile(&mut self, content: &str) -> Result<(), ReconcileError> {
        if let Some(op) = diff_replace(self.content.as_str(), content) {
            self.content
                .apply(std::slice::from_ref(&op))
                .map_err(|e| ReconcileError(e.to_string()))?;
        }
        Ok(())
    }
}

/// The read-only synchronization client for one document.
///
/// Governed by the same version state machine as the read-write client
/// but with no local-edit path. Clones share the same session.
pub struct ProjectionClient<T: Transport> {
    inner: Arc<ProjectionInner<T>>,
}

struct ProjectionInner<T> {
    config: SessionConfig,
    transport: T,
    session: Mutex<Session>,
    content: Mutex<ContentBuffer>,
    target: StdMutex<Option<Box<dyn ProjectionTarget>>>,
    subscribers: StdMutex<Vec<ContentCallback>>,
}

impl<T: Transport> Clone for ProjectionClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> ProjectionClient<T> {
    /// Open a read-only session for the configured document.
    pub async fn open(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        transport
            .open(&config.document, Capability::Read, &config.format)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ProjectionInner {
                config,
                transport,
                session: Mutex::new(Session::new()),
                content: Mutex::new(ContentBuffer::new()),
                target: StdMutex::new(None),
                subscribers: StdMutex::new(Vec::new()),
            }),
        })
    }

    /// Bind the rendered target.
    ///
    /// A target bound after content has already arrived is immediately
    /// reconciled against it.
    pub async fn bind_target(
        &self,
        target: impl ProjectionTarget + 'static,
    ) -> Result<(), ClientError> {
        let mut target: Box<dyn ProjectionTarget> = Box::new(target);

        let content = self.inner.content.lock().await;
        if !content.is_empty() {
            target.reconcile(content.as_str())?;
        }

        *self.inner.target.lock().unwrap() = Some(target);
        Ok(())
    }

    /// Register a callback invoked with full content after every
    /// successful reconciliation (including the first reset).
    pub fn subscribe(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push(Box::new(callback));
    }

    /// Handle one inbound message; see
    /// [`BufferClient::handle_message`](crate::BufferClient::handle_message).
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
                    self.replace_and_reconcile(content, version).await?;
                }
                SessionAction::ApplyOps { ops, version } => {
                    self.apply_and_reconcile(ops, version).await?;
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

    /// Close the session: unbind the target, close the transport.
    pub async fn close(&self) -> Result<(), ClientError> {
        *self.inner.target.lock().unwrap() = None;
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

    /// The document this session synchronizes.
    pub fn document(&self) -> &DocumentId {
        &self.inner.config.document
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    async fn replace_and_reconcile(
        &self,
        new_content: String,
        version: Version,
    ) -> Result<(), ClientError> {
        let mut content = self.inner.content.lock().await;
        content.replace_all(new_content);
        tracing::debug!(
            document = %self.inner.config.document,
            %version,
            "applied reset snapshot"
        );
        self.reconcile_target(content.as_str()).await
    }

    async fn apply_and_reconcile(
        &self,
        ops: Vec<Operation>,
        version: Version,
    ) -> Result<(), ClientError> {
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

        tracing::debug!(
            document = %self.inner.config.document,
            %version,
            ops = ops.len(),
            "applied patch"
        );
        self.reconcile_target(content.as_str()).await
    }

    /// Morph the bound target to the new content; any failure is
    /// answered with a reset request rather than surfaced.
    async fn reconcile_target(&self, content: &str) -> Result<(), ClientError> {
        let result = {
            let mut target = self.inner.target.lock().unwrap();
            match target.as_deref_mut() {
                Some(target) => target.reconcile(content),
                None => Ok(()),
            }
        };

        match result {
            Ok(()) => {
                // A successful reconciliation only happens in sync;
                // recovery, if any, has landed.
                self.inner.session.lock().await.note_recovered();
                self.notify_subscribers(content);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    document = %self.inner.config.document,
                    %error,
                    "reconciliation failed, requesting reset"
                );
                self.inner.session.lock().await.begin_reset_recovery();
                self.request_reset().await
            }
        }
    }

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
