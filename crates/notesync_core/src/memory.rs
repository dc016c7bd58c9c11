//! In-memory collaborators for tests, demos and the replay tool.
//!
//! - [`MemoryBackend`] stores documents and records every call made to it.
//!   It can be switched offline and given artificial latency.
//! - [`MemoryHub`] relays updates between [`MemoryChannel`] participants.
//! - [`RecordingSurface`] keeps the content written to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::mpsc;

use crate::client::{CollabChannel, ConnectionStatus, PersistenceClient};
use crate::error::ClientError;
use crate::surface::{EditingSurface, Selection};
use crate::types::{Document, DocumentId, DocumentPatch, Page, PageId, PageInput, RemoteUpdate};

/// A request received by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `get_document`
    GetDocument(DocumentId),
    /// `update_document`
    UpdateDocument(DocumentId, DocumentPatch),
    /// `update_page`
    UpdatePage(PageId, DocumentPatch),
    /// `create_page`
    CreatePage(DocumentId, Option<PageInput>),
    /// `delete_page`
    DeletePage(DocumentId, PageId),
}

impl BackendCall {
    /// Whether the call writes.
    pub fn is_write(&self) -> bool {
        !matches!(self, BackendCall::GetDocument(_))
    }
}

/// Document store implementing [`PersistenceClient`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: RwLock<IndexMap<DocumentId, Document>>,
    calls: Mutex<Vec<BackendCall>>,
    offline: AtomicBool,
    fetch_latency: Mutex<HashMap<DocumentId, Duration>>,
    write_latency: Mutex<Duration>,
}

impl MemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryBackend::insert_document`].
    pub fn with_document(self, document: Document) -> Self {
        self.insert_document(document);
        self
    }

    /// Store or overwrite a document.
    pub fn insert_document(&self, document: Document) {
        self.documents
            .write()
            .unwrap()
            .insert(document.id.clone(), document);
    }

    /// Stored copy of a document.
    pub fn document(&self, id: &DocumentId) -> Option<Document> {
        self.documents.read().unwrap().get(id).cloned()
    }

    /// Stored copy of a page.
    pub fn page(&self, id: &PageId) -> Option<Page> {
        self.documents
            .read()
            .unwrap()
            .values()
            .find_map(|doc| doc.page(id).cloned())
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Write calls so far.
    pub fn writes(&self) -> Vec<BackendCall> {
        self.calls().into_iter().filter(BackendCall::is_write).collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// While offline every call fails with [`ClientErrorKind::Unavailable`](crate::error::ClientErrorKind::Unavailable).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Whether the backend is offline.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Delay `get_document` for one document.
    pub fn set_fetch_latency(&self, id: impl Into<DocumentId>, latency: Duration) {
        self.fetch_latency.lock().unwrap().insert(id.into(), latency);
    }

    /// Delay every write.
    pub fn set_write_latency(&self, latency: Duration) {
        *self.write_latency.lock().unwrap() = latency;
    }

    fn begin(&self, call: BackendCall) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(call);
        if self.is_offline() {
            return Err(ClientError::unavailable("backend is offline"));
        }
        Ok(())
    }

    async fn write_delay(&self) {
        let latency = *self.write_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn not_found(id: impl std::fmt::Display) -> ClientError {
        ClientError::not_found(format!("{id} does not exist"))
    }
}

#[async_trait]
impl PersistenceClient for MemoryBackend {
    async fn get_document(&self, id: &DocumentId) -> Result<Document, ClientError> {
        self.begin(BackendCall::GetDocument(id.clone()))?;
        let latency = self.fetch_latency.lock().unwrap().get(id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.document(id).ok_or_else(|| Self::not_found(id))
    }

    async fn update_document(
        &self,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<Document, ClientError> {
        self.begin(BackendCall::UpdateDocument(id.clone(), patch.clone()))?;
        self.write_delay().await;

        let mut documents = self.documents.write().unwrap();
        let document = documents.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if let Some(title) = &patch.title {
            document.title = title.clone();
        }
        if let Some(content) = &patch.content {
            document.content = content.clone();
        }
        document.updated_at = Utc::now();
        Ok(document.clone())
    }

    async fn update_page(&self, id: &PageId, patch: &DocumentPatch) -> Result<Page, ClientError> {
        self.begin(BackendCall::UpdatePage(id.clone(), patch.clone()))?;
        self.write_delay().await;

        let mut documents = self.documents.write().unwrap();
        let page = documents
            .values_mut()
            .find_map(|doc| doc.page_mut(id))
            .ok_or_else(|| Self::not_found(id))?;
        if let Some(title) = &patch.title {
            page.title = title.clone();
        }
        if let Some(content) = &patch.content {
            page.content = content.clone();
        }
        page.updated_at = Utc::now();
        Ok(page.clone())
    }

    async fn create_page(
        &self,
        document_id: &DocumentId,
        input: Option<PageInput>,
    ) -> Result<Page, ClientError> {
        self.begin(BackendCall::CreatePage(document_id.clone(), input.clone()))?;
        self.write_delay().await;

        let mut documents = self.documents.write().unwrap();
        let document = documents
            .get_mut(document_id)
            .ok_or_else(|| Self::not_found(document_id))?;
        let input = input.unwrap_or_default();
        let page = Page {
            id: PageId::new(uuid::Uuid::new_v4().to_string()),
            document_id: document_id.clone(),
            position: input.position.unwrap_or_else(|| document.next_position()),
            title: input
                .title
                .unwrap_or_else(|| format!("Page {}", document.pages.len() + 1)),
            content: input.content.unwrap_or_default(),
            updated_at: Utc::now(),
        };
        document.pages.push(page.clone());
        Ok(page)
    }

    async fn delete_page(
        &self,
        document_id: &DocumentId,
        page_id: &PageId,
    ) -> Result<(), ClientError> {
        self.begin(BackendCall::DeletePage(document_id.clone(), page_id.clone()))?;
        self.write_delay().await;

        let mut documents = self.documents.write().unwrap();
        let document = documents
            .get_mut(document_id)
            .ok_or_else(|| Self::not_found(document_id))?;
        if document.page(page_id).is_none() {
            return Err(Self::not_found(page_id));
        }
        if document.pages.len() <= 1 {
            return Err(ClientError::rejected("cannot delete the last page"));
        }
        document.pages.retain(|p| &p.id != page_id);
        Ok(())
    }
}

#[derive(Debug)]
struct Member {
    participant: u64,
    sender: mpsc::UnboundedSender<RemoteUpdate>,
}

#[derive(Debug, Default)]
struct HubState {
    members: HashMap<DocumentId, Vec<Member>>,
    sent: Vec<(DocumentId, RemoteUpdate)>,
}

/// Relay connecting [`MemoryChannel`] participants.
#[derive(Debug)]
pub struct MemoryHub {
    state: Mutex<HubState>,
    available: AtomicBool,
    next_participant: AtomicU64,
}

impl MemoryHub {
    /// Create a reachable hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState::default()),
            available: AtomicBool::new(true),
            next_participant: AtomicU64::new(1),
        })
    }

    /// A new participant handle.
    pub fn participant(self: &Arc<Self>) -> MemoryChannel {
        MemoryChannel {
            hub: Arc::clone(self),
            participant: self.next_participant.fetch_add(1, Ordering::SeqCst),
            joined: Mutex::new(Vec::new()),
        }
    }

    /// Make the hub reachable or not. Existing subscriptions stay open but
    /// joins and sends fail while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether joins and sends succeed.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Inject an update from an outside peer to every member of a document.
    pub fn deliver(&self, document_id: &DocumentId, update: RemoteUpdate) {
        self.relay(0, document_id, update);
    }

    /// Updates sent by participants, oldest first.
    pub fn sent(&self) -> Vec<(DocumentId, RemoteUpdate)> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Number of participants joined to a document.
    pub fn members(&self, document_id: &DocumentId) -> usize {
        self.state
            .lock()
            .unwrap()
            .members
            .get(document_id)
            .map_or(0, Vec::len)
    }

    fn relay(&self, from: u64, document_id: &DocumentId, update: RemoteUpdate) {
        let mut state = self.state.lock().unwrap();
        if from != 0 {
            state.sent.push((document_id.clone(), update.clone()));
        }
        if let Some(members) = state.members.get_mut(document_id) {
            members.retain(|m| !m.sender.is_closed());
            for member in members.iter().filter(|m| m.participant != from) {
                let _ = member.sender.send(update.clone());
            }
        }
    }
}

/// One participant's connection to a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryChannel {
    hub: Arc<MemoryHub>,
    participant: u64,
    joined: Mutex<Vec<DocumentId>>,
}

#[async_trait]
impl CollabChannel for MemoryChannel {
    async fn join(
        &self,
        document_id: &DocumentId,
    ) -> Result<mpsc::UnboundedReceiver<RemoteUpdate>, ClientError> {
        if !self.hub.is_available() {
            return Err(ClientError::unavailable("collaboration hub unreachable"));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        {
            let mut state = self.hub.state.lock().unwrap();
            let members = state.members.entry(document_id.clone()).or_default();
            members.retain(|m| m.participant != self.participant);
            members.push(Member {
                participant: self.participant,
                sender,
            });
        }
        let mut joined = self.joined.lock().unwrap();
        if !joined.contains(document_id) {
            joined.push(document_id.clone());
        }
        Ok(receiver)
    }

    async fn leave(&self, document_id: &DocumentId) {
        if let Some(members) = self.hub.state.lock().unwrap().members.get_mut(document_id) {
            members.retain(|m| m.participant != self.participant);
        }
        self.joined.lock().unwrap().retain(|id| id != document_id);
    }

    async fn send(&self, document_id: &DocumentId, update: &RemoteUpdate) -> Result<(), ClientError> {
        if !self.hub.is_available() {
            return Err(ClientError::unavailable("collaboration hub unreachable"));
        }
        self.hub.relay(self.participant, document_id, update.clone());
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        if self.joined.lock().unwrap().is_empty() {
            ConnectionStatus::Solo
        } else if self.hub.is_available() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    content: String,
    selection: Selection,
    replacements: Vec<(String, Selection)>,
}

/// [`EditingSurface`] that remembers what was written to it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    state: Mutex<SurfaceState>,
}

impl RecordingSurface {
    /// Empty surface.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the user moving the cursor.
    pub fn set_selection(&self, selection: Selection) {
        self.state.lock().unwrap().selection = selection;
    }

    /// Simulate the user typing: the surface shows `content` with the
    /// cursor at its end.
    pub fn type_content(&self, content: &str) {
        let mut state = self.state.lock().unwrap();
        state.content = content.to_string();
        state.selection = Selection::caret(content.chars().count());
    }

    /// Displayed content.
    pub fn content(&self) -> String {
        self.state.lock().unwrap().content.clone()
    }

    /// Every programmatic replacement, oldest first.
    pub fn replacements(&self) -> Vec<(String, Selection)> {
        self.state.lock().unwrap().replacements.clone()
    }
}

impl EditingSurface for RecordingSurface {
    fn selection(&self) -> Selection {
        self.state.lock().unwrap().selection
    }

    fn replace_content(&self, content: &str, selection: Selection) {
        let mut state = self.state.lock().unwrap();
        state.content = content.to_string();
        state.selection = selection;
        state.replacements.push((content.to_string(), selection));
    }
}
