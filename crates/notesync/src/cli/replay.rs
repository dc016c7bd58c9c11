//! Runs a [`Script`] against in-memory collaborators.
//!
//! The replay wires a [`FetchCoordinator`] and an [`EditorSession`] the way
//! a client would: selecting a document paints the cached copy, the fetched
//! copy is then handed to the session, and every keystroke goes through
//! `on_field_change`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notesync_core::memory::{MemoryBackend, MemoryHub, RecordingSurface};
use notesync_core::{
    CollabChannel, ConnectionStatus, DocumentCache, DocumentId, DocumentView, EditorSession,
    EngineConfig, FetchCoordinator, Field, PageId, PageInput, RemoteUpdate, SaveStatus,
    SelectOutcome,
};
use serde::Serialize;
use tokio::time::Instant;

use super::script::{Script, Step};

/// Extra time allowed for a fetch beyond its debounce.
const FETCH_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub at_ms: u64,
    pub status: SaveStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub step: usize,
    pub message: String,
}

/// Editor state after the last step.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub document: Option<String>,
    pub active_page: Option<String>,
    pub title: String,
    pub content: String,
    pub status: SaveStatus,
    pub last_error: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub connection: ConnectionStatus,
    pub backend_writes: usize,
    pub broadcasts: usize,
    pub transitions: Vec<StatusChange>,
    pub failures: Vec<StepFailure>,
}

impl ReplaySummary {
    pub fn print(&self) {
        println!("Replay summary");
        println!("==============");
        println!();
        println!("Document: {}", self.document.as_deref().unwrap_or("(none)"));
        if let Some(page) = &self.active_page {
            println!("Active page: {}", page);
        }
        println!("Title: {}", self.title);
        println!("Content: {}", self.content);
        println!("Status: {}", self.status.label());
        if let Some(error) = &self.last_error {
            println!("  Last error: {}", error);
        }
        if let Some(modified) = &self.last_modified {
            println!("Last modified: {}", modified.to_rfc3339());
        }
        println!("Connection: {:?}", self.connection);
        println!("Backend writes: {}", self.backend_writes);
        println!("Broadcasts: {}", self.broadcasts);

        println!();
        println!("Status transitions:");
        for change in &self.transitions {
            println!("  {:>6} ms  {}", change.at_ms, change.status.label());
        }

        if !self.failures.is_empty() {
            println!();
            println!("Failed steps:");
            for failure in &self.failures {
                println!("  #{}: {}", failure.step + 1, failure.message);
            }
        }
    }
}

struct Replay {
    config: EngineConfig,
    backend: Arc<MemoryBackend>,
    hub: Arc<MemoryHub>,
    fetch: FetchCoordinator,
    session: EditorSession,
    surface: Arc<RecordingSurface>,
}

pub async fn run(config: EngineConfig, script: Script) -> ReplaySummary {
    let backend = Arc::new(MemoryBackend::new());
    for seed in &script.documents {
        backend.insert_document(seed.to_document(&script.viewer));
    }
    let hub = MemoryHub::new();
    let channel: Arc<dyn CollabChannel> = Arc::new(hub.participant());
    let surface = RecordingSurface::new();
    let cache = Arc::new(DocumentCache::new(config.cache_capacity));

    let replay = Replay {
        fetch: FetchCoordinator::new(backend.clone(), cache, &config),
        session: EditorSession::new(
            config.clone(),
            backend.clone(),
            Some(channel),
            surface.clone(),
            script.viewer.clone(),
        ),
        config,
        backend,
        hub,
        surface,
    };

    let started = Instant::now();
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let watcher = {
        let mut statuses = replay.session.subscribe_status();
        let transitions = Arc::clone(&transitions);
        tokio::spawn(async move {
            while statuses.changed().await.is_ok() {
                let status = *statuses.borrow_and_update();
                let at_ms = started.elapsed().as_millis() as u64;
                log::info!("[replay] {:>6} ms  status: {}", at_ms, status.label());
                transitions.lock().unwrap().push(StatusChange { at_ms, status });
            }
        })
    };

    let mut failures = Vec::new();
    for (index, step) in script.steps.into_iter().enumerate() {
        log::debug!("[replay] step {}: {:?}", index + 1, step);
        if let Err(message) = replay.apply(step).await {
            log::warn!("[replay] step {} failed: {}", index + 1, message);
            failures.push(StepFailure {
                step: index,
                message,
            });
        }
    }

    // Let the last status change reach the watcher.
    tokio::task::yield_now().await;
    watcher.abort();

    let transitions = transitions.lock().unwrap().clone();
    replay.summary(transitions, failures)
}

impl Replay {
    async fn apply(&self, step: Step) -> Result<(), String> {
        match step {
            Step::Select { document } => self.select(DocumentId::new(document)).await,
            Step::Type { content } => {
                self.surface.type_content(&content);
                self.session.on_field_change(Field::Content, content);
                Ok(())
            }
            Step::Title { title } => {
                self.session.on_field_change(Field::Title, title);
                Ok(())
            }
            Step::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            Step::Remote {
                content,
                title,
                page,
            } => self.remote(content, title, page).await,
            Step::SwitchPage { page } => self
                .session
                .switch_page(&PageId::new(page))
                .await
                .map_err(|e| e.to_string()),
            Step::CreatePage { title } => self
                .session
                .create_page(title.map(PageInput::titled))
                .await
                .map(|page| log::info!("[replay] created page {} ({})", page.title, page.id))
                .map_err(|e| e.to_string()),
            Step::DeletePage { page } => self
                .session
                .delete_page(&PageId::new(page))
                .await
                .map_err(|e| e.to_string()),
            Step::RenamePage { page, title } => self
                .session
                .rename_page(&PageId::new(page), title)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Step::Offline => {
                self.backend.set_offline(true);
                self.hub.set_available(false);
                Ok(())
            }
            Step::Online => {
                self.backend.set_offline(false);
                self.hub.set_available(true);
                Ok(())
            }
            Step::Flush => self.session.flush().await.map_err(|e| e.to_string()),
        }
    }

    async fn select(&self, id: DocumentId) -> Result<(), String> {
        if let SelectOutcome::Cached(document) = self.fetch.select(id.clone()) {
            self.session
                .load_document(document)
                .await
                .map_err(|e| e.to_string())?;
        }

        let mut views = self.fetch.subscribe();
        let wait = self.config.fetch_debounce() + FETCH_GRACE;
        let settled = tokio::time::timeout(
            wait,
            views.wait_for(|view| match view {
                DocumentView::Ready { document, stale } => !*stale && document.id == id,
                DocumentView::Failed { id: failed, .. } => failed == &id,
                _ => false,
            }),
        )
        .await
        .is_ok_and(|changed| changed.is_ok());
        if !settled {
            log::info!("[replay] no fresh copy of {}; keeping what is shown", id);
        }

        match self.fetch.view() {
            DocumentView::Ready { document, .. } if document.id == id => self
                .session
                .load_document(document)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            DocumentView::Failed { message, .. } => Err(message),
            _ => Err(format!("{} is no longer selected", id)),
        }
    }

    async fn remote(
        &self,
        content: String,
        title: Option<String>,
        page: Option<String>,
    ) -> Result<(), String> {
        let Some(document_id) = self.session.document_id() else {
            return Err("no document open for a remote update".to_string());
        };
        if self.hub.members(&document_id) == 0 {
            return Err(format!("{} is not shared; nobody else can edit it", document_id));
        }

        let title = title.unwrap_or_else(|| self.session.displayed().title);
        let mut update = RemoteUpdate::new(title, content);
        if let Some(page) = page {
            update = update.for_page(PageId::new(page));
        }
        self.hub.deliver(&document_id, update);
        // Give the session's inbound pump a chance to run.
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(())
    }

    fn summary(&self, transitions: Vec<StatusChange>, failures: Vec<StepFailure>) -> ReplaySummary {
        let displayed = self.session.displayed();
        ReplaySummary {
            document: self.session.document_id().map(|id| id.to_string()),
            active_page: self.session.active_page_id().map(|id| id.to_string()),
            title: displayed.title,
            content: displayed.content,
            status: self.session.status(),
            last_error: self.session.last_error(),
            last_modified: self.session.last_modified(),
            connection: self.session.connection_status(),
            backend_writes: self.backend.writes().len(),
            broadcasts: self.hub.sent().len(),
            transitions,
            failures,
        }
    }
}
