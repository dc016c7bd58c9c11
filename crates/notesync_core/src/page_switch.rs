//! Which surface of the open document is being edited.
//!
//! The coordinator owns the session's working copy of the open document and
//! the active page. It answers routing questions (where does content go on
//! flush), validates page operations before any request is made, and plans
//! the first-page migration.

use crate::edit_buffer::Baseline;
use crate::error::{Result, SyncError};
use crate::types::{Document, DocumentId, Field, Page, PageId, PageInput};

/// Where buffered content is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTarget {
    /// The document's own content (no pages).
    Document(DocumentId),
    /// The active page.
    Page(PageId),
}

/// Requests needed to add a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCreationPlan {
    /// The document has no pages yet. Its content must first move into a
    /// seed page, then the requested page is created.
    MigrateThenCreate {
        /// Page receiving the existing content.
        seed: PageInput,
        /// The page the user asked for.
        requested: PageInput,
    },
    /// Create the page directly.
    Create(PageInput),
}

/// Working copy of the open document plus the active page.
#[derive(Debug, Clone)]
pub struct PageSwitchCoordinator {
    document: Document,
    active_page: Option<PageId>,
}

impl PageSwitchCoordinator {
    /// Open `document` on its first page (or its own content).
    pub fn open(document: Document) -> Self {
        let active_page = document.first_page().map(|p| p.id.clone());
        Self {
            document,
            active_page,
        }
    }

    /// The working copy.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Identifier of the open document.
    pub fn document_id(&self) -> &DocumentId {
        &self.document.id
    }

    /// Active page, if the document has pages.
    pub fn active_page_id(&self) -> Option<&PageId> {
        self.active_page.as_ref()
    }

    /// Where content is persisted right now.
    pub fn content_target(&self) -> ContentTarget {
        match &self.active_page {
            Some(page_id) => ContentTarget::Page(page_id.clone()),
            None => ContentTarget::Document(self.document.id.clone()),
        }
    }

    /// Title and content of the active surface.
    pub fn editable(&self) -> Baseline {
        let content = match &self.active_page {
            Some(page_id) => self
                .document
                .page(page_id)
                .map(|p| p.content.clone())
                .unwrap_or_default(),
            None => self.document.content.clone(),
        };
        Baseline::new(self.document.title.clone(), content)
    }

    /// Make `page_id` active and return its editable values.
    pub fn activate_page(&mut self, page_id: &PageId) -> Result<Baseline> {
        if self.document.page(page_id).is_none() {
            return Err(self.page_not_found(page_id));
        }
        self.active_page = Some(page_id.clone());
        Ok(self.editable())
    }

    /// Swap in a fresh server copy of the same document.
    ///
    /// The active page is kept when it still exists. Returns true when the
    /// active surface changed as a result.
    pub fn replace_document(&mut self, document: Document) -> bool {
        let keep = self
            .active_page
            .as_ref()
            .filter(|id| document.page(id).is_some())
            .cloned();
        let active_page = keep.or_else(|| document.first_page().map(|p| p.id.clone()));
        let changed = active_page != self.active_page;
        self.document = document;
        self.active_page = active_page;
        changed
    }

    /// Write a value of the active surface into the working copy.
    pub fn set_field(&mut self, field: Field, value: &str) {
        match field {
            Field::Title => self.document.title = value.to_string(),
            Field::Content => match self.active_page.clone() {
                Some(page_id) => {
                    self.store_page_content(&page_id, value);
                }
                None => self.document.content = value.to_string(),
            },
        }
    }

    /// Write `content` into a page of the working copy.
    pub fn store_page_content(&mut self, page_id: &PageId, content: &str) -> bool {
        match self.document.page_mut(page_id) {
            Some(page) => {
                page.content = content.to_string();
                true
            }
            None => false,
        }
    }

    /// Rename a page in the working copy.
    pub fn set_page_title(&mut self, page_id: &PageId, title: &str) -> bool {
        match self.document.page_mut(page_id) {
            Some(page) => {
                page.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// Record a page the server returned (created or updated).
    pub fn upsert_page(&mut self, page: Page) {
        match self.document.page_mut(&page.id) {
            Some(existing) => *existing = page,
            None => self.document.pages.push(page),
        }
    }

    /// Drop a page from the working copy.
    pub fn remove_page(&mut self, page_id: &PageId) -> Option<Page> {
        let index = self.document.pages.iter().position(|p| &p.id == page_id)?;
        if self.active_page.as_ref() == Some(page_id) {
            self.active_page = None;
        }
        Some(self.document.pages.remove(index))
    }

    /// Requests needed to add a page, filling in defaults.
    pub fn plan_page_creation(&self, requested: Option<PageInput>) -> PageCreationPlan {
        let mut requested = requested.unwrap_or_default();
        if self.document.has_pages() {
            let count = self.document.pages.len();
            requested.title.get_or_insert_with(|| format!("Page {}", count + 1));
            requested.position.get_or_insert(self.document.next_position());
            return PageCreationPlan::Create(requested);
        }

        let seed = PageInput {
            title: Some("Page 1".to_string()),
            content: Some(self.document.content.clone()),
            position: Some(0),
        };
        requested.title.get_or_insert_with(|| "Page 2".to_string());
        requested.position.get_or_insert(1);
        PageCreationPlan::MigrateThenCreate { seed, requested }
    }

    /// Reject deleting a missing page or the only remaining page.
    pub fn check_page_deletion(&self, page_id: &PageId) -> Result<()> {
        if self.document.page(page_id).is_none() {
            return Err(self.page_not_found(page_id));
        }
        if self.document.pages.len() <= 1 {
            return Err(SyncError::LastPage(self.document.id.clone()));
        }
        Ok(())
    }

    /// Page to activate once `page_id` is gone: the next one by position,
    /// or the previous one when it was last.
    pub fn neighbour_after_removal(&self, page_id: &PageId) -> Option<PageId> {
        let ordered = self.document.ordered_pages();
        let index = ordered.iter().position(|p| &p.id == page_id)?;
        ordered
            .get(index + 1)
            .or_else(|| index.checked_sub(1).and_then(|i| ordered.get(i)))
            .map(|p| p.id.clone())
    }

    fn page_not_found(&self, page_id: &PageId) -> SyncError {
        SyncError::PageNotFound {
            document: self.document.id.clone(),
            page: page_id.clone(),
        }
    }
}
