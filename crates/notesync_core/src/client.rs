//! Collaborators the engine talks to: the REST-style persistence client and
//! the realtime collaboration channel.
//!
//! Both are injected as `Arc<dyn Trait>` so hosts can plug in an HTTP client
//! and a websocket relay, while tests use the in-memory implementations in
//! [`crate::memory`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::types::{Document, DocumentId, DocumentPatch, Page, PageId, PageInput, RemoteUpdate};

/// Request/response access to persisted documents.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Fetch the current server copy of a document, pages included.
    async fn get_document(&self, id: &DocumentId) -> Result<Document, ClientError>;

    /// Write title and/or content of a document.
    async fn update_document(
        &self,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<Document, ClientError>;

    /// Write title and/or content of a page.
    async fn update_page(&self, id: &PageId, patch: &DocumentPatch) -> Result<Page, ClientError>;

    /// Create a page. The server picks defaults for omitted fields.
    async fn create_page(
        &self,
        document_id: &DocumentId,
        input: Option<PageInput>,
    ) -> Result<Page, ClientError>;

    /// Delete a page.
    async fn delete_page(&self, document_id: &DocumentId, page_id: &PageId)
    -> Result<(), ClientError>;
}

/// Connection state of the collaboration channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No channel configured, or the document is not shared.
    #[default]
    Solo,
    /// Joined and relaying updates.
    Connected,
    /// The channel dropped or could not be reached.
    Disconnected,
}

/// Pub/sub channel keyed by document.
///
/// Updates sent by a participant are delivered to every other participant
/// joined to the same document, never back to the sender.
#[async_trait]
pub trait CollabChannel: Send + Sync {
    /// Join a document's channel and receive its updates.
    async fn join(
        &self,
        document_id: &DocumentId,
    ) -> Result<mpsc::UnboundedReceiver<RemoteUpdate>, ClientError>;

    /// Leave a document's channel.
    async fn leave(&self, document_id: &DocumentId);

    /// Broadcast an update to the other participants.
    async fn send(&self, document_id: &DocumentId, update: &RemoteUpdate)
    -> Result<(), ClientError>;

    /// Current connection state.
    fn status(&self) -> ConnectionStatus;
}
