//! Explicit registry of open synchronization sessions.
//!
//! Owned by the top-level application context; maps a document
//! identifier to its open session handle with explicit open/close
//! lifecycle. One session per document: a second open for the same
//! document is rejected until the first is closed.

use dashmap::DashMap;
use doc_types::DocumentId;

use crate::client::{BufferClient, ClientError, SessionConfig};
use crate::projection::ProjectionClient;
use crate::transport::Transport;

/// An open session handle, either capability.
pub enum DocSession<T: Transport> {
    /// A read-write session.
    Buffer(BufferClient<T>),
    /// A read-only session.
    Projection(ProjectionClient<T>),
}

impl<T: Transport> Clone for DocSession<T> {
    fn clone(&self) -> Self {
        match self {
            DocSession::Buffer(client) => DocSession::Buffer(client.clone()),
            DocSession::Projection(client) => DocSession::Projection(client.clone()),
        }
    }
}

/// Registry of open sessions, keyed by document.
pub struct ConnectionManager<T: Transport> {
    sessions: DashMap<DocumentId, DocSession<T>>,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Open a read-write session and register it.
    pub async fn open_buffer(
        &self,
        transport: T,
        config: SessionConfig,
    ) -> Result<BufferClient<T>, ClientError> {
        self.reserve(&config.document)?;
        let client = BufferClient::open(transport, config).await?;
        self.register(DocSession::Buffer(client.clone()));
        Ok(client)
    }

    /// Open a read-only session and register it.
    pub async fn open_projection(
        &self,
        transport: T,
        config: SessionConfig,
    ) -> Result<ProjectionClient<T>, ClientError> {
        self.reserve(&config.document)?;
        let client = ProjectionClient::open(transport, config).await?;
        self.register(DocSession::Projection(client.clone()));
        Ok(client)
    }

    /// Look up the open session for a document.
    pub fn get(&self, document: &DocumentId) -> Option<DocSession<T>> {
        self.sessions.get(document).map(|entry| entry.value().clone())
    }

    /// Whether a session is open for the document.
    pub fn contains(&self, document: &DocumentId) -> bool {
        self.sessions.contains_key(document)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close and deregister the session for a document.
    ///
    /// A no-op when no session is open for it.
    pub async fn close(&self, document: &DocumentId) -> Result<(), ClientError> {
        match self.sessions.remove(document) {
            Some((_, DocSession::Buffer(client))) => client.close().await,
            Some((_, DocSession::Projection(client))) => client.close().await,
            None => Ok(()),
        }
    }

    /// Close and deregister every session.
    pub async fn close_all(&self) -> Result<(), ClientError> {
        let documents: Vec<DocumentId> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for document in documents {
            self.close(&document).await?;
        }
        Ok(())
    }

    fn reserve(&self, document: &DocumentId) -> Result<(), ClientError> {
        if self.sessions.contains_key(document) {
            return Err(ClientError::SessionOpen(document.clone()));
        }
        Ok(())
    }

    fn register(&self, session: DocSession<T>) {
        let document = match &session {
            DocSession::Buffer(client) => client.document().clone(),
            DocSession::Projection(client) => client.document().clone(),
        };
        self.sessions.insert(document, session);
    }
}

impl<T: Transport + 'static> Default for ConnectionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
