//! Documents, pages and the payloads exchanged with the persistence client
//! and the collaboration channel.
//!
//! A [`Document`] either edits its own `content` (no pages) or the content of
//! its active [`Page`]. Once a document has pages its own `content` field is
//! never used as an editing surface again.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a document (a note).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a page inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named content surface belonging to exactly one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Page identifier.
    pub id: PageId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Ordering key; lower positions come first.
    pub position: u32,
    /// Page title.
    pub title: String,
    /// Serialized rich content, opaque to the engine.
    #[serde(default)]
    pub content: String,
    /// Last time the server confirmed a write to this page.
    pub updated_at: DateTime<Utc>,
}

/// A note as held by the client. This is a read replica of the server copy
/// and may be stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document identifier.
    pub id: DocumentId,
    /// Document title.
    pub title: String,
    /// Single-surface content, only edited while the document has no pages.
    #[serde(default)]
    pub content: String,
    /// Pages in arbitrary order; see [`Document::ordered_pages`].
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
    /// Owning user, if known.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Users the document is shared with.
    #[serde(default)]
    pub collaborators: Vec<String>,
}

impl Document {
    /// Create a page-less, unshared document.
    pub fn new(
        id: impl Into<DocumentId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            pages: Vec::new(),
            updated_at: Utc::now(),
            owner_id: None,
            collaborators: Vec::new(),
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Add a collaborator.
    pub fn with_collaborator(mut self, user_id: impl Into<String>) -> Self {
        self.collaborators.push(user_id.into());
        self
    }

    /// Append a page with the next free position.
    pub fn with_page(
        mut self,
        id: impl Into<PageId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let page = Page {
            id: id.into(),
            document_id: self.id.clone(),
            position: self.next_position(),
            title: title.into(),
            content: content.into(),
            updated_at: self.updated_at,
        };
        self.pages.push(page);
        self
    }

    /// Whether the editable surface is a page rather than the document body.
    pub fn has_pages(&self) -> bool {
        !self.pages.is_empty()
    }

    /// Pages sorted by position.
    pub fn ordered_pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.iter().collect();
        pages.sort_by_key(|p| p.position);
        pages
    }

    /// The page that becomes active when the document is opened.
    pub fn first_page(&self) -> Option<&Page> {
        self.pages.iter().min_by_key(|p| p.position)
    }

    /// Look up a page.
    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|p| &p.id == id)
    }

    /// Look up a page mutably.
    pub fn page_mut(&mut self, id: &PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| &p.id == id)
    }

    /// Position for a page appended after every existing page.
    pub fn next_position(&self) -> u32 {
        self.pages
            .iter()
            .map(|p| p.position + 1)
            .max()
            .unwrap_or(0)
    }

    /// Whether `viewer_id` would be editing alongside other people.
    ///
    /// A document counts as shared when it has collaborators or when the
    /// viewer is not its owner.
    pub fn is_shared_with(&self, viewer_id: &str) -> bool {
        !self.collaborators.is_empty()
            || self
                .owner_id
                .as_deref()
                .is_some_and(|owner| owner != viewer_id)
    }
}

/// Editable fields of the active surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The document title.
    Title,
    /// The active surface's content.
    Content,
}

/// Partial update sent to `update_document` / `update_page`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    /// New title, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New content, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DocumentPatch {
    /// A patch carrying only a title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: None,
        }
    }

    /// A patch carrying only content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(content.into()),
        }
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Input for `create_page`. Missing fields are filled in by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInput {
    /// Page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Initial content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordering key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl PageInput {
    /// Input with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Update event carried by the collaboration channel.
///
/// `page_id` names the page the content belongs to. Peers that do not know
/// about pages leave it empty, in which case the event targets whatever
/// surface the receiver has active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUpdate {
    /// Document title.
    pub title: String,
    /// Content of the edited surface.
    pub content: String,
    /// Page the content belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<PageId>,
}

impl RemoteUpdate {
    /// Event for the receiver's active surface.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            page_id: None,
        }
    }

    /// Scope the event to a page.
    pub fn for_page(mut self, page_id: PageId) -> Self {
        self.page_id = Some(page_id);
        self
    }
}
