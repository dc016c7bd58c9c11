//! Debounced document fetching for the currently selected document.
//!
//! Selecting a document paints the cached snapshot immediately (if any) and
//! schedules a fetch after a short debounce. Responses are always cached,
//! but only shown when the fetched document is still the wanted one.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

use crate::cache::DocumentCache;
use crate::client::PersistenceClient;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::types::{Document, DocumentId};

/// What the document pane should show.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DocumentView {
    /// Nothing selected.
    #[default]
    Empty,
    /// Waiting for the first response for this document.
    Loading(DocumentId),
    /// A document is available.
    Ready {
        /// The document.
        document: Document,
        /// True while the snapshot comes from the cache and the fetch has
        /// not confirmed it yet.
        stale: bool,
    },
    /// The fetch failed and there is nothing to fall back on.
    Failed {
        /// Requested document.
        id: DocumentId,
        /// Failure message.
        message: String,
    },
}

impl DocumentView {
    /// The displayed document, if any.
    pub fn document(&self) -> Option<&Document> {
        match self {
            DocumentView::Ready { document, .. } => Some(document),
            _ => None,
        }
    }

    /// Whether the view is showing `id` (loaded, loading or failed).
    pub fn shows(&self, id: &DocumentId) -> bool {
        match self {
            DocumentView::Empty => false,
            DocumentView::Loading(loading) => loading == id,
            DocumentView::Ready { document, .. } => &document.id == id,
            DocumentView::Failed { id: failed, .. } => failed == id,
        }
    }
}

/// Immediate result of [`FetchCoordinator::select`].
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// A cached snapshot is displayed while the fetch runs.
    Cached(Document),
    /// Nothing cached; a loading state is displayed.
    Loading,
}

struct FetchInner {
    client: Arc<dyn PersistenceClient>,
    cache: Arc<DocumentCache>,
    debounce: Debouncer,
    wanted: Mutex<Option<DocumentId>>,
    view: watch::Sender<DocumentView>,
}

/// Fetches the wanted document, discarding stale responses.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<FetchInner>,
}

impl FetchCoordinator {
    /// Create a coordinator over a shared cache.
    pub fn new(
        client: Arc<dyn PersistenceClient>,
        cache: Arc<DocumentCache>,
        config: &EngineConfig,
    ) -> Self {
        let (view, _) = watch::channel(DocumentView::Empty);
        Self {
            inner: Arc::new(FetchInner {
                client,
                cache,
                debounce: Debouncer::new("fetch", config.fetch_debounce()),
                wanted: Mutex::new(None),
                view,
            }),
        }
    }

    /// The user chose `id`.
    pub fn select(&self, id: DocumentId) -> SelectOutcome {
        let inner = &self.inner;
        inner.debounce.cancel();
        *inner.wanted.lock().unwrap() = Some(id.clone());

        let outcome = match inner.cache.get(&id) {
            Some(document) => {
                log::debug!("[FetchCoordinator] Cache hit for {}", id);
                inner.view.send_replace(DocumentView::Ready {
                    document: document.clone(),
                    stale: true,
                });
                SelectOutcome::Cached(document)
            }
            None => {
                inner.view.send_replace(DocumentView::Loading(id.clone()));
                SelectOutcome::Loading
            }
        };

        let weak = Arc::downgrade(&self.inner);
        inner.debounce.schedule(move || run_fetch(weak, id));
        outcome
    }

    /// No document is wanted anymore.
    pub fn deselect(&self) {
        self.inner.debounce.cancel();
        *self.inner.wanted.lock().unwrap() = None;
        self.inner.view.send_replace(DocumentView::Empty);
    }

    /// `id` was deleted: drop its snapshot and stop showing it.
    pub fn invalidate(&self, id: &DocumentId) {
        self.inner.cache.remove(id);
        let mut wanted = self.inner.wanted.lock().unwrap();
        if wanted.as_ref() == Some(id) {
            self.inner.debounce.cancel();
            *wanted = None;
            self.inner.view.send_replace(DocumentView::Empty);
        }
    }

    /// Currently wanted document.
    pub fn wanted(&self) -> Option<DocumentId> {
        self.inner.wanted.lock().unwrap().clone()
    }

    /// Current view.
    pub fn view(&self) -> DocumentView {
        self.inner.view.borrow().clone()
    }

    /// Watch view changes.
    pub fn subscribe(&self) -> watch::Receiver<DocumentView> {
        self.inner.view.subscribe()
    }

    /// The snapshot cache.
    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.inner.cache
    }
}

async fn run_fetch(inner: Weak<FetchInner>, id: DocumentId) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    log::debug!("[FetchCoordinator] Fetching {}", id);
    let result = inner.client.get_document(&id).await;

    let wanted = inner.wanted.lock().unwrap();
    let current = wanted.as_ref() == Some(&id);
    match result {
        Ok(document) => {
            let evicted = inner.cache.insert(id.clone(), document.clone());
            if !evicted.is_empty() {
                log::debug!("[FetchCoordinator] Evicted {} snapshot(s)", evicted.len());
            }
            if current {
                inner.view.send_replace(DocumentView::Ready {
                    document,
                    stale: false,
                });
            } else {
                log::debug!("[FetchCoordinator] Discarding stale response for {}", id);
            }
        }
        Err(err) if !current => {
            log::debug!("[FetchCoordinator] Ignoring failure for unwanted {}: {}", id, err);
        }
        Err(err) => {
            let has_fallback = inner.view.borrow().document().is_some_and(|d| d.id == id);
            if has_fallback {
                log::warn!("[FetchCoordinator] Fetch of {} failed, keeping cached copy: {}", id, err);
            } else {
                log::warn!("[FetchCoordinator] Fetch of {} failed: {}", id, err);
                inner.view.send_replace(DocumentView::Failed {
                    id,
                    message: err.to_string(),
                });
            }
        }
    }
}
