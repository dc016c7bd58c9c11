use std::sync::Arc;
use std::time::Duration;

use notesync_core::memory::{BackendCall, MemoryBackend};
use notesync_core::{
    Document, DocumentCache, DocumentId, DocumentView, EngineConfig, FetchCoordinator,
    SelectOutcome,
};

fn backend() -> Arc<MemoryBackend> {
    Arc::new(
        MemoryBackend::new()
            .with_document(Document::new("a", "Alpha", "first"))
            .with_document(Document::new("b", "Beta", "second"))
            .with_document(Document::new("c", "Gamma", "third")),
    )
}

fn coordinator(backend: &Arc<MemoryBackend>, capacity: usize) -> FetchCoordinator {
    FetchCoordinator::new(
        backend.clone(),
        Arc::new(DocumentCache::new(capacity)),
        &EngineConfig::default(),
    )
}

fn shown_title(fetch: &FetchCoordinator) -> Option<String> {
    fetch.view().document().map(|d| d.title.clone())
}

#[tokio::test(start_paused = true)]
async fn slow_response_never_overwrites_newer_selection() {
    let backend = backend();
    backend.set_fetch_latency("a", Duration::from_millis(500));
    let fetch = coordinator(&backend, 20);

    fetch.select(DocumentId::new("a"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    fetch.select(DocumentId::new("b"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(shown_title(&fetch).as_deref(), Some("Beta"));

    // A's response lands long after B was shown.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(shown_title(&fetch).as_deref(), Some("Beta"));
    assert!(fetch.cache().contains(&DocumentId::new("a")));
}

#[tokio::test(start_paused = true)]
async fn rapid_selection_issues_a_single_fetch() {
    let backend = backend();
    let fetch = coordinator(&backend, 20);

    for id in ["a", "b", "c"] {
        fetch.select(DocumentId::new(id));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        backend.calls(),
        vec![BackendCall::GetDocument(DocumentId::new("c"))]
    );
    assert_eq!(shown_title(&fetch).as_deref(), Some("Gamma"));
}

#[tokio::test(start_paused = true)]
async fn cached_snapshot_survives_offline_reselect() {
    let backend = backend();
    let fetch = coordinator(&backend, 20);
    fetch
        .cache()
        .insert(DocumentId::new("x"), Document::new("x", "Draft", "body"));
    backend.set_offline(true);

    let outcome = fetch.select(DocumentId::new("x"));
    assert!(matches!(outcome, SelectOutcome::Cached(ref doc) if doc.title == "Draft"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.calls().len(), 1);
    match fetch.view() {
        DocumentView::Ready { document, stale } => {
            assert_eq!(document.title, "Draft");
            assert!(stale);
        }
        other => panic!("expected cached document, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn failure_without_snapshot_is_surfaced() {
    let backend = backend();
    backend.set_offline(true);
    let fetch = coordinator(&backend, 20);

    assert_eq!(fetch.select(DocumentId::new("a")), SelectOutcome::Loading);
    tokio::time::sleep(Duration::from_millis(100)).await;

    match fetch.view() {
        DocumentView::Failed { id, message } => {
            assert_eq!(id, DocumentId::new("a"));
            assert!(message.contains("offline"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn deselect_blocks_late_response() {
    let backend = backend();
    backend.set_fetch_latency("a", Duration::from_millis(500));
    let fetch = coordinator(&backend, 20);

    fetch.select(DocumentId::new("a"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    fetch.deselect();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(fetch.view(), DocumentView::Empty);
    assert!(fetch.wanted().is_none());
    // The request was not aborted; its result is still cached.
    assert!(fetch.cache().contains(&DocumentId::new("a")));
}

#[tokio::test(start_paused = true)]
async fn deselect_before_debounce_makes_no_request() {
    let backend = backend();
    let fetch = coordinator(&backend, 20);

    fetch.select(DocumentId::new("a"));
    fetch.deselect();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cache_evicts_oldest_fetched_document() {
    let backend = backend();
    let fetch = coordinator(&backend, 2);

    for id in ["a", "b", "c"] {
        fetch.select(DocumentId::new(id));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(
        fetch.cache().keys(),
        vec![DocumentId::new("b"), DocumentId::new("c")]
    );
}

#[tokio::test(start_paused = true)]
async fn view_changes_are_observable() {
    let backend = backend();
    let fetch = coordinator(&backend, 20);
    let mut views = fetch.subscribe();

    fetch.select(DocumentId::new("b"));
    views.changed().await.unwrap();
    assert_eq!(*views.borrow_and_update(), DocumentView::Loading(DocumentId::new("b")));

    views.changed().await.unwrap();
    assert_eq!(
        views.borrow_and_update().document().map(|d| d.title.clone()),
        Some("Beta".to_string())
    );
}
