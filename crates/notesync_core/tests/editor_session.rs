use std::sync::Arc;
use std::time::Duration;

use notesync_core::memory::{BackendCall, MemoryBackend, MemoryHub, RecordingSurface};
use notesync_core::{
    ChangeOutcome, CollabChannel, ConnectionStatus, Document, DocumentId, DocumentPatch,
    EditorSession, EngineConfig, Field, PageId, RemoteDecision, RemoteUpdate, SaveStatus,
    Selection, SyncError,
};

struct Harness {
    backend: Arc<MemoryBackend>,
    surface: Arc<RecordingSurface>,
    session: EditorSession,
}

impl Harness {
    fn new(documents: Vec<Document>) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        for document in documents {
            backend.insert_document(document);
        }
        Self::with_backend(backend, None, "alice")
    }

    fn with_backend(
        backend: Arc<MemoryBackend>,
        channel: Option<Arc<dyn CollabChannel>>,
        viewer: &str,
    ) -> Self {
        let surface = RecordingSurface::new();
        let session = EditorSession::new(
            EngineConfig::default(),
            backend.clone(),
            channel,
            surface.clone(),
            viewer,
        );
        Self {
            backend,
            surface,
            session,
        }
    }

    async fn open(&self, id: &str) {
        let document = self
            .backend
            .document(&DocumentId::new(id))
            .expect("document exists");
        self.session.open(document).await.unwrap();
        self.backend.clear_calls();
    }

    /// What the embedder does on every keystroke.
    fn type_content(&self, content: &str) -> ChangeOutcome {
        self.surface.type_content(content);
        self.session.on_field_change(Field::Content, content)
    }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn note() -> Document {
    Document::new("n1", "Groceries", "eggs").with_owner("alice")
}

fn paged_note() -> Document {
    Document::new("d", "Project", "")
        .with_owner("alice")
        .with_page("p1", "One", "hello")
        .with_page("p2", "Two", "second page")
}

#[tokio::test(start_paused = true)]
async fn status_follows_debounced_save() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    assert_eq!(h.type_content("eggs, milk"), ChangeOutcome::Recorded);
    assert_eq!(h.session.status(), SaveStatus::Unsaved);

    sleep_ms(1100).await;
    assert_eq!(h.session.status(), SaveStatus::Unsaved);
    assert!(h.backend.writes().is_empty());

    sleep_ms(200).await;
    assert_eq!(h.session.status(), SaveStatus::Saved);
    assert_eq!(
        h.backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk"
    );
    assert!(h.session.pending(Field::Content).is_none());
}

#[tokio::test(start_paused = true)]
async fn keystrokes_restart_the_save_debounce() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    for text in ["eggs,", "eggs, m", "eggs, mi", "eggs, mil", "eggs, milk"] {
        h.type_content(text);
        sleep_ms(400).await;
    }
    assert!(h.backend.writes().is_empty());

    sleep_ms(1000).await;
    assert_eq!(
        h.backend.writes(),
        vec![BackendCall::UpdateDocument(
            DocumentId::new("n1"),
            DocumentPatch::content("eggs, milk")
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn edit_during_slow_save_is_not_lost() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.backend.set_write_latency(Duration::from_millis(500));
    let mut statuses = h.session.subscribe_status();

    h.type_content("eggs, milk");
    sleep_ms(1300).await;
    assert_eq!(h.session.status(), SaveStatus::Saving);

    // Typed while the first save is on the wire.
    h.type_content("eggs, milk, bread");
    sleep_ms(500).await;
    assert_eq!(h.session.status(), SaveStatus::Unsaved);
    assert_eq!(
        h.session.pending(Field::Content).as_deref(),
        Some("eggs, milk, bread")
    );
    assert_eq!(h.session.baseline().content, "eggs, milk");

    sleep_ms(2000).await;
    assert_eq!(h.session.status(), SaveStatus::Saved);
    assert_eq!(
        h.backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk, bread"
    );
    assert!(statuses.has_changed().unwrap());
    assert_eq!(*statuses.borrow_and_update(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn flushing_identical_content_makes_no_request() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    h.type_content("eggs, milk");
    h.session.flush().await.unwrap();
    h.session.flush().await.unwrap();
    assert_eq!(h.backend.writes().len(), 1);
    assert_eq!(h.session.status(), SaveStatus::Saved);

    // Typing and deleting back to the saved text needs no write either.
    h.type_content("eggs, milk!");
    h.type_content("eggs, milk");
    h.session.flush().await.unwrap();
    assert_eq!(h.backend.writes().len(), 1);
    assert_eq!(h.session.status(), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_edits_until_retry() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.backend.set_offline(true);

    h.type_content("eggs, milk");
    sleep_ms(1300).await;
    assert_eq!(h.session.status(), SaveStatus::Error);
    assert!(h.session.last_error().unwrap().contains("offline"));
    assert_eq!(h.session.pending(Field::Content).as_deref(), Some("eggs, milk"));

    h.type_content("eggs, milk, tea");
    assert_eq!(h.session.status(), SaveStatus::Error);

    h.backend.set_offline(false);
    h.session.flush().await.unwrap();
    assert_eq!(h.session.status(), SaveStatus::Saved);
    assert!(h.session.last_error().is_none());
    assert_eq!(
        h.backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk, tea"
    );
}

#[tokio::test(start_paused = true)]
async fn content_routes_to_active_page_and_title_to_document() {
    let h = Harness::new(vec![paged_note()]);
    h.open("d").await;

    h.session.on_field_change(Field::Title, "Project X");
    h.type_content("hello there");
    h.session.flush().await.unwrap();

    assert_eq!(
        h.backend.writes(),
        vec![
            BackendCall::UpdateDocument(DocumentId::new("d"), DocumentPatch::title("Project X")),
            BackendCall::UpdatePage(PageId::new("p1"), DocumentPatch::content("hello there")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn page_switch_flushes_before_loading_next_page() {
    let h = Harness::new(vec![paged_note()]);
    h.open("d").await;

    h.type_content("hello world");
    assert_eq!(h.session.status(), SaveStatus::Unsaved);
    sleep_ms(500).await;

    h.session.switch_page(&PageId::new("p2")).await.unwrap();

    assert_eq!(
        h.backend.writes(),
        vec![BackendCall::UpdatePage(
            PageId::new("p1"),
            DocumentPatch::content("hello world")
        )]
    );
    assert_eq!(h.backend.page(&PageId::new("p1")).unwrap().content, "hello world");
    assert_eq!(h.session.active_page_id(), Some(PageId::new("p2")));
    assert_eq!(h.surface.content(), "second page");
    assert_eq!(h.session.baseline().content, "second page");
    assert_eq!(h.session.status(), SaveStatus::Saved);
    assert!(!h.session.is_recently_edited());

    // The old page's debounce never fires afterwards.
    sleep_ms(2000).await;
    assert_eq!(h.backend.writes().len(), 1);

    h.session.switch_page(&PageId::new("p1")).await.unwrap();
    assert_eq!(h.surface.content(), "hello world");
}

#[tokio::test(start_paused = true)]
async fn failed_flush_aborts_page_switch() {
    let h = Harness::new(vec![paged_note()]);
    h.open("d").await;
    h.backend.set_offline(true);

    h.type_content("hello world");
    let err = h.session.switch_page(&PageId::new("p2")).await.unwrap_err();
    assert!(matches!(err, SyncError::Save(_)));
    assert_eq!(h.session.active_page_id(), Some(PageId::new("p1")));
    assert_eq!(h.session.pending(Field::Content).as_deref(), Some("hello world"));
    assert_eq!(h.session.status(), SaveStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn document_switch_resets_editing_state() {
    let other = Document::new("n2", "Todo", "laundry").with_owner("alice");
    let h = Harness::new(vec![note(), other]);
    h.open("n1").await;

    h.type_content("eggs, milk");
    let next = h.backend.document(&DocumentId::new("n2")).unwrap();
    h.session.switch_document(next).await.unwrap();

    assert_eq!(
        h.backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk"
    );
    assert_eq!(h.session.document_id(), Some(DocumentId::new("n2")));
    assert_eq!(h.session.displayed().content, "laundry");
    assert_eq!(h.session.displayed().title, "Todo");
    assert!(!h.session.has_pending());
    assert!(!h.session.is_recently_edited());
    assert_eq!(h.session.status(), SaveStatus::Saved);
    assert_eq!(h.surface.content(), "laundry");
}

#[tokio::test(start_paused = true)]
async fn remote_update_within_guard_window_is_deferred() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    h.type_content("eggs, milk");
    sleep_ms(500).await;
    let decision = h.session.receive_remote(RemoteUpdate::new("Groceries", "eggs, flour"));
    assert_eq!(decision, RemoteDecision::Defer);
    assert_eq!(h.surface.content(), "eggs, milk");
    assert_eq!(h.session.displayed().content, "eggs, milk");

    sleep_ms(2000).await;
    let decision = h.session.receive_remote(RemoteUpdate::new("Groceries", "eggs, flour"));
    assert_eq!(decision, RemoteDecision::Apply);
    assert_eq!(h.surface.content(), "eggs, flour");
    assert_eq!(h.session.baseline().content, "eggs, flour");
}

#[tokio::test(start_paused = true)]
async fn echo_of_own_save_is_not_reapplied() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    h.type_content("eggs, milk");
    h.session.flush().await.unwrap();
    let replacements = h.surface.replacements().len();

    let decision = h.session.receive_remote(RemoteUpdate::new("Groceries", "eggs, milk"));
    assert_eq!(decision, RemoteDecision::Unchanged);
    assert_eq!(h.surface.replacements().len(), replacements);
}

#[tokio::test(start_paused = true)]
async fn remote_replacement_preserves_clamped_selection() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.surface.set_selection(Selection::new(1, 3));

    h.session.receive_remote(RemoteUpdate::new("Groceries", "oat milk"));
    let (content, selection) = h.surface.replacements().last().cloned().unwrap();
    assert_eq!(content, "oat milk");
    assert_eq!(selection, Selection::new(1, 3));

    sleep_ms(100).await;
    h.surface.set_selection(Selection::new(5, 8));
    h.session.receive_remote(RemoteUpdate::new("Groceries", "tea"));
    let (_, selection) = h.surface.replacements().last().cloned().unwrap();
    assert_eq!(selection, Selection::new(3, 3));
}

#[tokio::test(start_paused = true)]
async fn applied_remote_change_is_not_rebroadcast() {
    let hub = MemoryHub::new();
    let backend = Arc::new(MemoryBackend::new().with_document(note().with_collaborator("bob")));
    let alice = Harness::with_backend(backend.clone(), Some(Arc::new(hub.participant())), "alice");
    alice.open("n1").await;

    hub.deliver(&DocumentId::new("n1"), RemoteUpdate::new("Groceries", "from bob"));
    sleep_ms(10).await;
    assert_eq!(alice.surface.content(), "from bob");

    // The widget echoes the programmatic replacement as a change.
    assert_eq!(
        alice.session.on_field_change(Field::Content, "from bob "),
        ChangeOutcome::Suppressed
    );
    sleep_ms(100).await;
    assert!(hub.sent().is_empty());
    assert!(backend.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn local_changes_reach_other_participants_immediately() {
    let hub = MemoryHub::new();
    let shared = note().with_collaborator("bob");
    let backend = Arc::new(MemoryBackend::new().with_document(shared));

    let alice = Harness::with_backend(backend.clone(), Some(Arc::new(hub.participant())), "alice");
    let bob = Harness::with_backend(backend.clone(), Some(Arc::new(hub.participant())), "bob");
    alice.open("n1").await;
    bob.open("n1").await;
    assert_eq!(hub.members(&DocumentId::new("n1")), 2);
    assert_eq!(alice.session.connection_status(), ConnectionStatus::Connected);

    alice.type_content("eggs, milk");
    sleep_ms(10).await;

    assert_eq!(bob.surface.content(), "eggs, milk");
    assert_eq!(bob.session.displayed().content, "eggs, milk");
    // Broadcast happened well before the save debounce.
    assert!(backend.writes().is_empty());
    assert_eq!(hub.sent().len(), 1);

    sleep_ms(1300).await;
    assert_eq!(alice.session.status(), SaveStatus::Saved);
    assert_eq!(bob.session.status(), SaveStatus::Saved);
    assert_eq!(backend.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unshared_document_never_joins_channel() {
    let hub = MemoryHub::new();
    let backend = Arc::new(MemoryBackend::new().with_document(note()));
    let alice = Harness::with_backend(backend, Some(Arc::new(hub.participant())), "alice");
    alice.open("n1").await;

    alice.type_content("eggs, milk");
    sleep_ms(10).await;
    assert_eq!(hub.members(&DocumentId::new("n1")), 0);
    assert!(hub.sent().is_empty());
    assert_eq!(alice.session.connection_status(), ConnectionStatus::Solo);
}

#[tokio::test(start_paused = true)]
async fn unreachable_channel_degrades_to_solo_editing() {
    let hub = MemoryHub::new();
    hub.set_available(false);
    let backend = Arc::new(MemoryBackend::new().with_document(note().with_collaborator("bob")));
    let alice = Harness::with_backend(backend.clone(), Some(Arc::new(hub.participant())), "alice");
    alice.open("n1").await;
    assert_eq!(alice.session.connection_status(), ConnectionStatus::Solo);

    alice.type_content("eggs, milk");
    sleep_ms(1300).await;
    assert_eq!(alice.session.status(), SaveStatus::Saved);
    assert_eq!(
        backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk"
    );
}

#[tokio::test(start_paused = true)]
async fn first_extra_page_migrates_existing_content() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    let page = h.session.create_page(None).await.unwrap();
    assert_eq!(page.title, "Page 2");

    let stored = h.backend.document(&DocumentId::new("n1")).unwrap();
    let pages = stored.ordered_pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].title, "Page 1");
    assert_eq!(pages[0].content, "eggs");
    assert_eq!(pages[1].id, page.id);

    assert_eq!(h.session.active_page_id(), Some(page.id.clone()));
    assert_eq!(h.surface.content(), "");
    let writes = h.backend.writes();
    assert!(matches!(&writes[0], BackendCall::CreatePage(_, Some(input)) if input.content.as_deref() == Some("eggs")));
    assert_eq!(writes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn migration_carries_unsaved_text() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;

    h.type_content("eggs, milk");
    h.session.create_page(None).await.unwrap();

    let stored = h.backend.document(&DocumentId::new("n1")).unwrap();
    assert_eq!(stored.ordered_pages()[0].content, "eggs, milk");
}

#[tokio::test(start_paused = true)]
async fn last_page_cannot_be_deleted() {
    let doc = Document::new("d", "Single", "").with_page("only", "Only", "text");
    let h = Harness::new(vec![doc]);
    h.open("d").await;

    let err = h.session.delete_page(&PageId::new("only")).await.unwrap_err();
    assert!(matches!(err, SyncError::LastPage(_)));
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.session.document().unwrap().pages.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleting_active_page_activates_neighbour() {
    let h = Harness::new(vec![paged_note()]);
    h.open("d").await;

    h.session.delete_page(&PageId::new("p1")).await.unwrap();
    assert_eq!(h.session.active_page_id(), Some(PageId::new("p2")));
    assert_eq!(h.surface.content(), "second page");
    assert_eq!(h.session.document().unwrap().pages.len(), 1);
    assert_eq!(
        h.backend.document(&DocumentId::new("d")).unwrap().pages.len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn rename_page_updates_working_copy() {
    let h = Harness::new(vec![paged_note()]);
    h.open("d").await;

    let page = h.session.rename_page(&PageId::new("p2"), "Appendix").await.unwrap();
    assert_eq!(page.title, "Appendix");
    let doc = h.session.document().unwrap();
    assert_eq!(doc.page(&PageId::new("p2")).unwrap().title, "Appendix");
}

#[tokio::test(start_paused = true)]
async fn refreshed_copy_respects_guard_window() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.type_content("eggs, milk");

    let mut fresh = h.backend.document(&DocumentId::new("n1")).unwrap();
    fresh.content = "eggs, flour".to_string();
    assert_eq!(h.session.load_document(fresh.clone()).await.unwrap(), RemoteDecision::Defer);
    assert_eq!(h.surface.content(), "eggs, milk");

    sleep_ms(3000).await;
    // Outside the guard window the fetched copy wins.
    let decision = h.session.load_document(fresh).await.unwrap();
    assert_eq!(decision, RemoteDecision::Apply);
    assert_eq!(h.surface.content(), "eggs, flour");
}

#[tokio::test(start_paused = true)]
async fn close_flushes_and_forgets_document() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.type_content("eggs, milk");

    h.session.close().await.unwrap();
    assert!(h.session.document_id().is_none());
    assert_eq!(
        h.backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk"
    );
    assert_eq!(
        h.session.on_field_change(Field::Content, "late"),
        ChangeOutcome::NoDocument
    );
}

#[tokio::test(start_paused = true)]
async fn page_switch_waits_for_save_in_flight() {
    let h = Harness::new(vec![paged_note()]);
    h.open("d").await;
    h.backend.set_write_latency(Duration::from_millis(500));

    h.type_content("hello w");
    sleep_ms(1210).await;
    assert_eq!(h.session.status(), SaveStatus::Saving);

    // The slow write is still on the wire when the user types on and leaves.
    h.backend.set_write_latency(Duration::from_millis(10));
    h.type_content("hello world");
    h.session.switch_page(&PageId::new("p2")).await.unwrap();

    assert_eq!(
        h.backend.writes(),
        vec![
            BackendCall::UpdatePage(PageId::new("p1"), DocumentPatch::content("hello w")),
            BackendCall::UpdatePage(PageId::new("p1"), DocumentPatch::content("hello world")),
        ]
    );
    assert_eq!(h.backend.page(&PageId::new("p1")).unwrap().content, "hello world");
    assert_eq!(h.session.active_page_id(), Some(PageId::new("p2")));
    assert_eq!(h.session.status(), SaveStatus::Saved);

    sleep_ms(3000).await;
    assert_eq!(h.backend.writes().len(), 2);
    assert_eq!(h.backend.page(&PageId::new("p1")).unwrap().content, "hello world");
}

#[tokio::test(start_paused = true)]
async fn remote_update_keeps_edits_after_failed_save() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.backend.set_offline(true);

    h.type_content("eggs, milk");
    sleep_ms(1300).await;
    assert_eq!(h.session.status(), SaveStatus::Error);

    // Well past the guard window, but the edit was never saved.
    sleep_ms(1000).await;
    assert!(!h.session.is_recently_edited());
    let decision = h.session.receive_remote(RemoteUpdate::new("Groceries", "eggs, flour"));
    assert_eq!(decision, RemoteDecision::Defer);
    assert_eq!(h.session.status(), SaveStatus::Error);
    assert_eq!(h.session.pending(Field::Content).as_deref(), Some("eggs, milk"));
    assert_eq!(h.surface.content(), "eggs, milk");

    let mut fresh = h.backend.document(&DocumentId::new("n1")).unwrap();
    fresh.content = "eggs, flour".to_string();
    assert_eq!(h.session.load_document(fresh).await.unwrap(), RemoteDecision::Defer);
    assert_eq!(h.session.status(), SaveStatus::Error);
    assert_eq!(h.session.pending(Field::Content).as_deref(), Some("eggs, milk"));

    h.backend.set_offline(false);
    h.session.flush().await.unwrap();
    assert_eq!(h.session.status(), SaveStatus::Saved);
    assert_eq!(
        h.backend.document(&DocumentId::new("n1")).unwrap().content,
        "eggs, milk"
    );
}

#[tokio::test(start_paused = true)]
async fn remote_replacement_keeps_backward_selection() {
    let h = Harness::new(vec![note()]);
    h.open("n1").await;
    h.surface.set_selection(Selection::new(6, 2));

    h.session.receive_remote(RemoteUpdate::new("Groceries", "oat milk"));
    let (_, selection) = h.surface.replacements().last().cloned().unwrap();
    assert_eq!(selection, Selection::new(6, 2));

    sleep_ms(100).await;
    h.surface.set_selection(Selection::new(9, 1));
    h.session.receive_remote(RemoteUpdate::new("Groceries", "tea"));
    let (_, selection) = h.surface.replacements().last().cloned().unwrap();
    assert_eq!(selection, Selection::new(3, 1));
}
