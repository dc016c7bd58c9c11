//! The editing session for the open document.
//!
//! [`EditorSession`] wires the edit buffer, save status, reconciler and page
//! coordinator to the injected collaborators:
//!
//! - local changes are buffered, broadcast immediately and saved after the
//!   save debounce;
//! - remote updates are reconciled against the buffer and written to the
//!   surface with the selection preserved;
//! - page and document switches flush first and then reset all transient
//!   editing state.
//!
//! The session is cheap to clone; clones share state. The state lock is
//! never held across an `.await` or while calling into the surface; writes
//! to the server take a separate async lock so they never overlap.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::client::{CollabChannel, ConnectionStatus, PersistenceClient};
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::edit_buffer::{Baseline, EditBuffer, FlushCandidate};
use crate::error::{ClientError, Result, SyncError};
use crate::page_switch::{ContentTarget, PageCreationPlan, PageSwitchCoordinator};
use crate::reconciler::{
    ReconcilePhase, RemoteDecision, RemoteReconciler, should_join, update_values,
};
use crate::save_status::{SaveStatus, SaveStatusModel};
use crate::surface::{EditingSurface, restore_selection};
use crate::types::{Document, DocumentId, DocumentPatch, Field, Page, PageId, PageInput, RemoteUpdate};

/// What happened to a change reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Buffered, broadcast and scheduled for saving.
    Recorded,
    /// Side effect of applying remote content; dropped.
    Suppressed,
    /// Same value as displayed; nothing to do.
    Unchanged,
    /// No document is open.
    NoDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    /// Fired by the save debounce. Skipped while another write is in flight;
    /// that write's completion re-arms the debounce.
    Debounced,
    /// Switches, retries and close. Waits for the write in flight, then
    /// writes the newest values.
    Forced,
}

struct SessionState {
    scope: Option<PageSwitchCoordinator>,
    buffer: EditBuffer,
    saves: SaveStatusModel,
    reconciler: RemoteReconciler,
    displayed: Baseline,
    last_modified: Option<DateTime<Utc>>,
    epoch: u64,
}

impl SessionState {
    fn reset_scope(&mut self, scope: PageSwitchCoordinator, last_modified: Option<DateTime<Utc>>) {
        let editable = scope.editable();
        self.scope = Some(scope);
        self.reset_surface(editable);
        self.last_modified = last_modified;
    }

    fn reset_surface(&mut self, editable: Baseline) {
        self.buffer.reset(editable.clone());
        self.saves.reset();
        self.reconciler.reset();
        self.displayed = editable;
        self.epoch += 1;
    }

    /// Reconcile external values for the active surface. Returns the decision
    /// and, when applied, the content to write into the surface.
    fn reconcile(&mut self, values: Baseline, now: Instant) -> (RemoteDecision, Option<String>) {
        let decision = self
            .reconciler
            .decide(&values, &self.buffer, &self.displayed, now);
        match decision {
            RemoteDecision::Unchanged | RemoteDecision::Defer => (decision, None),
            RemoteDecision::Adopt => {
                self.buffer.advance_baseline(values);
                (decision, None)
            }
            RemoteDecision::Apply => {
                self.reconciler.begin_remote();
                self.buffer.replace_baseline(values.clone());
                if let Some(scope) = self.scope.as_mut() {
                    scope.set_field(Field::Title, &values.title);
                    scope.set_field(Field::Content, &values.content);
                }
                let content_changed = self.displayed.content != values.content;
                let content = values.content.clone();
                self.displayed = values;
                (decision, content_changed.then_some(content))
            }
        }
    }
}

#[derive(Default)]
struct ChannelLinks {
    joined: Option<DocumentId>,
    inbound: Option<JoinHandle<()>>,
    outbound: Option<mpsc::UnboundedSender<RemoteUpdate>>,
}

struct SessionInner {
    config: EngineConfig,
    client: Arc<dyn PersistenceClient>,
    channel: Option<Arc<dyn CollabChannel>>,
    surface: Arc<dyn EditingSurface>,
    viewer_id: String,
    state: Mutex<SessionState>,
    /// Held for the whole of a write so writes to one target never overlap.
    writes: tokio::sync::Mutex<()>,
    status: watch::Sender<SaveStatus>,
    save_timer: Debouncer,
    settle_timer: Debouncer,
    links: Mutex<ChannelLinks>,
}

/// Editing session for one open document at a time.
#[derive(Clone)]
pub struct EditorSession {
    inner: Arc<SessionInner>,
}

impl EditorSession {
    /// Create a session with nothing open.
    ///
    /// Without a `channel` the session always edits solo.
    pub fn new(
        config: EngineConfig,
        client: Arc<dyn PersistenceClient>,
        channel: Option<Arc<dyn CollabChannel>>,
        surface: Arc<dyn EditingSurface>,
        viewer_id: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Saved);
        let state = SessionState {
            scope: None,
            buffer: EditBuffer::default(),
            saves: SaveStatusModel::new(),
            reconciler: RemoteReconciler::new(config.guard_window()),
            displayed: Baseline::default(),
            last_modified: None,
            epoch: 0,
        };
        Self {
            inner: Arc::new(SessionInner {
                save_timer: Debouncer::new("save", config.save_debounce()),
                settle_timer: Debouncer::new("remote-settle", config.remote_settle()),
                config,
                client,
                channel,
                surface,
                viewer_id: viewer_id.into(),
                state: Mutex::new(state),
                writes: tokio::sync::Mutex::new(()),
                status,
                links: Mutex::new(ChannelLinks::default()),
            }),
        }
    }

    fn from_weak(weak: &Weak<SessionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Current save status.
    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    /// Watch save status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Message of the failure behind [`SaveStatus::Error`].
    pub fn last_error(&self) -> Option<String> {
        self.state().saves.last_error().map(str::to_string)
    }

    /// Title and content currently displayed.
    pub fn displayed(&self) -> Baseline {
        self.state().displayed.clone()
    }

    /// Last values known to be persisted for the active surface.
    pub fn baseline(&self) -> Baseline {
        self.state().buffer.baseline().clone()
    }

    /// Buffered, unsaved value of `field`.
    pub fn pending(&self, field: Field) -> Option<String> {
        self.state().buffer.pending(field).map(str::to_string)
    }

    /// Whether any edit is waiting to be saved.
    pub fn has_pending(&self) -> bool {
        self.state().buffer.has_pending()
    }

    /// Identifier of the open document.
    pub fn document_id(&self) -> Option<DocumentId> {
        self.state().scope.as_ref().map(|s| s.document_id().clone())
    }

    /// Working copy of the open document.
    pub fn document(&self) -> Option<Document> {
        self.state().scope.as_ref().map(|s| s.document().clone())
    }

    /// Active page, when the open document has pages.
    pub fn active_page_id(&self) -> Option<PageId> {
        self.state().scope.as_ref().and_then(|s| s.active_page_id().cloned())
    }

    /// When the server last confirmed a write (or the load time of the
    /// document when nothing was written yet).
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.state().last_modified
    }

    /// Whether the user typed within the guard window.
    pub fn is_recently_edited(&self) -> bool {
        let guard = self.inner.config.guard_window();
        self.state()
            .buffer
            .is_recently_edited(Instant::now(), guard)
    }

    /// Reconciler phase.
    pub fn phase(&self) -> ReconcilePhase {
        self.state().reconciler.phase()
    }

    /// Collaboration channel state. `Solo` when there is no channel or the
    /// open document is not joined.
    pub fn connection_status(&self) -> ConnectionStatus {
        let joined = self.inner.links.lock().unwrap().joined.is_some();
        match (&self.inner.channel, joined) {
            (Some(channel), true) => channel.status(),
            _ => ConnectionStatus::Solo,
        }
    }

    fn publish(&self, status: SaveStatus) {
        let changed = self.inner.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            log::debug!("[EditorSession] Save status: {:?}", status);
        }
    }

    // ------------------------------------------------------------------
    // Local edits and saving
    // ------------------------------------------------------------------

    /// Forward of the surface's content/title changed callback.
    pub fn on_field_change(&self, field: Field, value: impl Into<String>) -> ChangeOutcome {
        let value = value.into();
        let (status, broadcast) = {
            let mut state = self.state();
            if state.scope.is_none() {
                return ChangeOutcome::NoDocument;
            }
            if state.reconciler.phase() == ReconcilePhase::ApplyingRemote {
                log::trace!("[EditorSession] Ignoring change caused by remote update");
                return ChangeOutcome::Suppressed;
            }
            if state.displayed.get(field) == value {
                return ChangeOutcome::Unchanged;
            }

            state.reconciler.on_local_change();
            state.buffer.record(field, value.clone(), Instant::now());
            state.displayed.set(field, value.clone());
            let status = state.saves.on_edit();
            let mut update = RemoteUpdate::new(
                state.displayed.title.clone(),
                state.displayed.content.clone(),
            );

            let Some(scope) = state.scope.as_mut() else {
                return ChangeOutcome::NoDocument;
            };
            scope.set_field(field, &value);
            if let Some(page_id) = scope.active_page_id() {
                update = update.for_page(page_id.clone());
            }
            (status, update)
        };

        self.publish(status);
        self.broadcast(broadcast);
        self.schedule_save();
        ChangeOutcome::Recorded
    }

    fn broadcast(&self, update: RemoteUpdate) {
        let links = self.inner.links.lock().unwrap();
        if let Some(outbound) = &links.outbound
            && outbound.send(update).is_err()
        {
            log::warn!("[EditorSession] Outbound channel closed; change not broadcast");
        }
    }

    fn schedule_save(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.save_timer.schedule(move || async move {
            let Some(session) = EditorSession::from_weak(&weak) else {
                return;
            };
            if let Err(err) = session.flush_once(FlushMode::Debounced).await {
                log::warn!("[EditorSession] Autosave failed: {}", err);
            }
        });
    }

    /// Save buffered edits now, e.g. from a retry button after an error.
    pub async fn flush(&self) -> Result<()> {
        self.inner.save_timer.cancel();
        self.flush_once(FlushMode::Forced).await.map(|_| ())
    }

    /// Flush until nothing is buffered for the current surface.
    async fn flush_all(&self) -> Result<()> {
        loop {
            self.inner.save_timer.cancel();
            self.flush_once(FlushMode::Forced).await?;
            if !self.has_pending() {
                return Ok(());
            }
        }
    }

    /// One flush cycle. Returns true when a write was made.
    async fn flush_once(&self, mode: FlushMode) -> Result<bool> {
        let _write = match mode {
            FlushMode::Debounced => match self.inner.writes.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    log::debug!("[EditorSession] Save already in flight, deferring");
                    return Ok(false);
                }
            },
            FlushMode::Forced => self.inner.writes.lock().await,
        };

        let (candidate, target, document_id, epoch) = {
            let mut state = self.state();
            let Some(scope) = state.scope.as_ref() else {
                return Ok(false);
            };
            let target = scope.content_target();
            let document_id = scope.document_id().clone();

            let Some(candidate) = state.buffer.snapshot() else {
                state.reconciler.finish_local_editing();
                let status = state.saves.on_flush_succeeded(false);
                drop(state);
                self.publish(status);
                return Ok(false);
            };

            let status = state.saves.on_flush_started();
            let epoch = state.epoch;
            drop(state);
            self.publish(status);
            (candidate, target, document_id, epoch)
        };

        log::debug!(
            "[EditorSession] Saving {} (title: {}, content: {})",
            document_id,
            candidate.title.is_some(),
            candidate.content.is_some()
        );
        let result = self.persist(&target, &document_id, &candidate).await;

        let mut reschedule = false;
        let status = {
            let mut state = self.state();
            if state.epoch != epoch {
                log::debug!("[EditorSession] Save for {} finished after a switch", document_id);
                return result.map(|_| true).map_err(SyncError::Save);
            }
            match &result {
                Ok(confirmed_at) => {
                    state.buffer.complete(&candidate);
                    state.last_modified = Some(*confirmed_at);
                    let has_pending = state.buffer.has_pending();
                    if !has_pending {
                        state.reconciler.finish_local_editing();
                    }
                    reschedule = has_pending && !self.inner.save_timer.is_pending();
                    state.saves.on_flush_succeeded(has_pending)
                }
                Err(err) => {
                    log::warn!("[EditorSession] Save of {} failed: {}", document_id, err);
                    state.saves.on_flush_failed(err.to_string())
                }
            }
        };

        self.publish(status);
        if reschedule {
            self.schedule_save();
        }
        result.map(|_| true).map_err(SyncError::Save)
    }

    /// Write a candidate. Content follows the active surface; the title
    /// always goes to the document.
    async fn persist(
        &self,
        target: &ContentTarget,
        document_id: &DocumentId,
        candidate: &FlushCandidate,
    ) -> std::result::Result<DateTime<Utc>, ClientError> {
        let client = &self.inner.client;
        match target {
            ContentTarget::Document(id) => {
                let document = client.update_document(id, &candidate.patch()).await?;
                Ok(document.updated_at)
            }
            ContentTarget::Page(page_id) => {
                let mut confirmed_at = Utc::now();
                if let Some(title) = &candidate.title {
                    let document = client
                        .update_document(document_id, &DocumentPatch::title(title.clone()))
                        .await?;
                    confirmed_at = document.updated_at;
                }
                if let Some(content) = &candidate.content {
                    let page = client
                        .update_page(page_id, &DocumentPatch::content(content.clone()))
                        .await?;
                    confirmed_at = page.updated_at;
                }
                Ok(confirmed_at)
            }
        }
    }

    // ------------------------------------------------------------------
    // Remote updates
    // ------------------------------------------------------------------

    /// Reconcile an update received from the collaboration channel.
    ///
    /// Updates naming a page other than the active one only refresh the
    /// working copy of that page.
    pub fn receive_remote(&self, update: RemoteUpdate) -> RemoteDecision {
        let (decision, replacement) = {
            let mut state = self.state();
            let Some(scope) = state.scope.as_mut() else {
                return RemoteDecision::Unchanged;
            };
            if let Some(page_id) = &update.page_id
                && scope.active_page_id() != Some(page_id)
            {
                scope.store_page_content(page_id, &update.content);
                log::debug!("[EditorSession] Stored remote content for inactive page {}", page_id);
                return RemoteDecision::Unchanged;
            }
            state.reconcile(update_values(&update), Instant::now())
        };
        self.after_reconcile(decision, replacement);
        decision
    }

    fn after_reconcile(&self, decision: RemoteDecision, replacement: Option<String>) {
        match decision {
            RemoteDecision::Defer => {
                log::debug!("[EditorSession] Remote update deferred; local edits in progress");
            }
            RemoteDecision::Apply => {
                if let Some(content) = replacement {
                    self.replace_surface(&content);
                }
                let weak = Arc::downgrade(&self.inner);
                self.inner.settle_timer.schedule(move || async move {
                    if let Some(session) = EditorSession::from_weak(&weak) {
                        session.state().reconciler.settle();
                    }
                });
            }
            RemoteDecision::Unchanged | RemoteDecision::Adopt => {}
        }
    }

    fn replace_surface(&self, content: &str) {
        let surface = &self.inner.surface;
        let selection = restore_selection(surface.selection(), content);
        surface.replace_content(content, selection);
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Open `document`, replacing whatever was open.
    pub async fn open(&self, document: Document) -> Result<()> {
        self.switch_document(document).await
    }

    /// Switch to another document.
    ///
    /// Pending edits of the current surface are flushed first. If that
    /// flush fails the switch is aborted and the current document stays
    /// open with its edits buffered.
    pub async fn switch_document(&self, document: Document) -> Result<()> {
        self.flush_all().await?;
        self.inner.save_timer.cancel();
        self.inner.settle_timer.cancel();
        self.leave_channel().await;

        let id = document.id.clone();
        let join = should_join(&document, &self.inner.viewer_id);
        let content = {
            let mut state = self.state();
            let last_modified = document.updated_at;
            state.reset_scope(PageSwitchCoordinator::open(document), Some(last_modified));
            state.displayed.content.clone()
        };
        log::info!("[EditorSession] Opened document {}", id);
        self.publish(SaveStatus::Saved);
        self.replace_surface(&content);

        if join {
            self.join_channel(&id).await;
        }
        Ok(())
    }

    /// Take a freshly fetched copy of a document.
    ///
    /// A copy of the open document is reconciled like a remote update, so
    /// it cannot erase recent typing. Any other document is switched to.
    pub async fn load_document(&self, document: Document) -> Result<RemoteDecision> {
        if self.document_id().as_ref() != Some(&document.id) {
            self.switch_document(document).await?;
            return Ok(RemoteDecision::Apply);
        }

        let (decision, replacement) = {
            let mut state = self.state();
            let displayed = state.displayed.clone();
            let Some(scope) = state.scope.as_mut() else {
                return Err(SyncError::NoDocument);
            };
            let active_changed = scope.replace_document(document);
            let fresh = scope.editable();

            if active_changed {
                log::warn!("[EditorSession] Active page vanished from {}", scope.document_id());
                state.reset_surface(fresh.clone());
                (RemoteDecision::Apply, Some(fresh.content))
            } else {
                scope.set_field(Field::Title, &displayed.title);
                scope.set_field(Field::Content, &displayed.content);
                state.reconcile(fresh, Instant::now())
            }
        };
        self.after_reconcile(decision, replacement);
        Ok(decision)
    }

    /// Flush, leave the channel and forget the open document.
    ///
    /// Fails without closing when the final flush fails.
    pub async fn close(&self) -> Result<()> {
        self.flush_all().await?;
        self.inner.save_timer.cancel();
        self.inner.settle_timer.cancel();
        self.leave_channel().await;
        {
            let mut state = self.state();
            state.scope = None;
            state.reset_surface(Baseline::default());
            state.last_modified = None;
        }
        self.publish(SaveStatus::Saved);
        log::info!("[EditorSession] Closed");
        Ok(())
    }

    async fn join_channel(&self, id: &DocumentId) {
        let Some(channel) = self.inner.channel.clone() else {
            return;
        };
        let mut inbound = match channel.join(id).await {
            Ok(receiver) => receiver,
            Err(err) => {
                log::warn!("[EditorSession] Could not join {}; editing solo: {}", id, err);
                return;
            }
        };

        let weak = Arc::downgrade(&self.inner);
        let inbound_task = tokio::spawn(async move {
            while let Some(update) = inbound.recv().await {
                let Some(session) = EditorSession::from_weak(&weak) else {
                    break;
                };
                session.receive_remote(update);
            }
        });

        let (outbound, mut outgoing) = mpsc::unbounded_channel::<RemoteUpdate>();
        let document_id = id.clone();
        tokio::spawn(async move {
            while let Some(update) = outgoing.recv().await {
                if let Err(err) = channel.send(&document_id, &update).await {
                    log::warn!("[EditorSession] Broadcast for {} failed: {}", document_id, err);
                }
            }
        });

        let mut links = self.inner.links.lock().unwrap();
        links.joined = Some(id.clone());
        links.inbound = Some(inbound_task);
        links.outbound = Some(outbound);
        log::info!("[EditorSession] Joined collaboration channel for {}", id);
    }

    async fn leave_channel(&self) {
        let joined = {
            let mut links = self.inner.links.lock().unwrap();
            if let Some(task) = links.inbound.take() {
                task.abort();
            }
            // Dropping the sender lets the outbound task drain and exit.
            links.outbound = None;
            links.joined.take()
        };
        if let (Some(id), Some(channel)) = (joined, &self.inner.channel) {
            channel.leave(&id).await;
            log::debug!("[EditorSession] Left collaboration channel for {}", id);
        }
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    /// Make another page of the open document active.
    ///
    /// Pending edits are persisted to the current page first; if that fails
    /// the switch is aborted.
    pub async fn switch_page(&self, page_id: &PageId) -> Result<()> {
        {
            let state = self.state();
            let scope = state.scope.as_ref().ok_or(SyncError::NoDocument)?;
            if scope.document().page(page_id).is_none() {
                return Err(SyncError::PageNotFound {
                    document: scope.document_id().clone(),
                    page: page_id.clone(),
                });
            }
            if scope.active_page_id() == Some(page_id) {
                return Ok(());
            }
        }

        self.flush_all().await?;
        self.inner.save_timer.cancel();
        self.inner.settle_timer.cancel();

        let content = {
            let mut state = self.state();
            let scope = state.scope.as_mut().ok_or(SyncError::NoDocument)?;
            let editable = scope.activate_page(page_id)?;
            state.reset_surface(editable);
            state.displayed.content.clone()
        };
        log::debug!("[EditorSession] Switched to page {}", page_id);
        self.publish(SaveStatus::Saved);
        self.replace_surface(&content);
        Ok(())
    }

    /// Add a page and make it active.
    ///
    /// On a document without pages the existing content first moves into a
    /// new "Page 1".
    pub async fn create_page(&self, input: Option<PageInput>) -> Result<Page> {
        self.flush_all().await?;
        let (document_id, plan) = {
            let state = self.state();
            let scope = state.scope.as_ref().ok_or(SyncError::NoDocument)?;
            (scope.document_id().clone(), scope.plan_page_creation(input))
        };

        let requested = match plan {
            PageCreationPlan::MigrateThenCreate { seed, requested } => {
                log::info!("[EditorSession] Moving content of {} into a first page", document_id);
                let seed = self.inner.client.create_page(&document_id, Some(seed)).await?;
                let seed_id = seed.id.clone();
                self.adopt_page(&document_id, seed)?;
                self.switch_page(&seed_id).await?;
                requested
            }
            PageCreationPlan::Create(requested) => requested,
        };

        let page = self
            .inner
            .client
            .create_page(&document_id, Some(requested))
            .await?;
        self.adopt_page(&document_id, page.clone())?;
        self.switch_page(&page.id).await?;
        Ok(page)
    }

    fn adopt_page(&self, document_id: &DocumentId, page: Page) -> Result<()> {
        let mut state = self.state();
        match state.scope.as_mut() {
            Some(scope) if scope.document_id() == document_id => {
                scope.upsert_page(page);
                Ok(())
            }
            _ => Err(SyncError::NoDocument),
        }
    }

    /// Delete a page of the open document.
    ///
    /// Deleting the only page is rejected without contacting the server.
    /// Deleting the active page activates its neighbour first.
    pub async fn delete_page(&self, page_id: &PageId) -> Result<()> {
        let (document_id, neighbour) = {
            let state = self.state();
            let scope = state.scope.as_ref().ok_or(SyncError::NoDocument)?;
            scope.check_page_deletion(page_id)?;
            let neighbour = if scope.active_page_id() == Some(page_id) {
                scope.neighbour_after_removal(page_id)
            } else {
                None
            };
            (scope.document_id().clone(), neighbour)
        };

        if let Some(neighbour) = neighbour {
            self.switch_page(&neighbour).await?;
        }
        self.inner.client.delete_page(&document_id, page_id).await?;

        if let Some(scope) = self.state().scope.as_mut() {
            scope.remove_page(page_id);
        }
        log::info!("[EditorSession] Deleted page {} of {}", page_id, document_id);
        Ok(())
    }

    /// Rename a page of the open document.
    pub async fn rename_page(&self, page_id: &PageId, title: impl Into<String>) -> Result<Page> {
        let title = title.into();
        {
            let state = self.state();
            let scope = state.scope.as_ref().ok_or(SyncError::NoDocument)?;
            if scope.document().page(page_id).is_none() {
                return Err(SyncError::PageNotFound {
                    document: scope.document_id().clone(),
                    page: page_id.clone(),
                });
            }
        }

        let page = self
            .inner
            .client
            .update_page(page_id, &DocumentPatch::title(title.clone()))
            .await?;
        if let Some(scope) = self.state().scope.as_mut() {
            scope.set_page_title(page_id, &title);
        }
        Ok(page)
    }
}
