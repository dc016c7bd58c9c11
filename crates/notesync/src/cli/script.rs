//! Replay scripts.
//!
//! A script seeds the in-memory backend with documents and lists the steps
//! to perform, in order:
//!
//! ```toml
//! viewer = "alice"
//!
//! [[documents]]
//! id = "n1"
//! title = "Groceries"
//! content = "eggs"
//!
//! [[steps]]
//! action = "select"
//! document = "n1"
//!
//! [[steps]]
//! action = "type"
//! content = "eggs, milk"
//!
//! [[steps]]
//! action = "wait"
//! ms = 1300
//! ```

use std::fs;
use std::path::Path;

use notesync_core::{Document, DocumentId, PageId};
use serde::Deserialize;

use super::CliError;

fn default_viewer() -> String {
    "me".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// User running the session; decides which documents count as shared.
    #[serde(default = "default_viewer")]
    pub viewer: String,
    #[serde(default)]
    pub documents: Vec<DocumentSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub owner: Option<String>,
    #[serde(default)]
    pub collaborators: Vec<String>,
    #[serde(default)]
    pub pages: Vec<PageSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Select a document in the list.
    Select { document: String },
    /// Replace the active surface's content, as typing would.
    Type { content: String },
    /// Change the document title.
    Title { title: String },
    /// Let time pass.
    Wait { ms: u64 },
    /// Another participant edits the open document.
    Remote {
        content: String,
        title: Option<String>,
        page: Option<String>,
    },
    SwitchPage { page: String },
    CreatePage { title: Option<String> },
    DeletePage { page: String },
    RenamePage { page: String, title: String },
    /// Backend and collaboration hub become unreachable.
    Offline,
    Online,
    /// Save now (the retry button).
    Flush,
}

impl Script {
    pub fn from_toml_str(contents: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let contents = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

impl DocumentSpec {
    pub fn to_document(&self, viewer: &str) -> Document {
        let owner = self.owner.clone().unwrap_or_else(|| viewer.to_string());
        let mut document = Document::new(DocumentId::new(&self.id), &self.title, &self.content)
            .with_owner(owner);
        for collaborator in &self.collaborators {
            document = document.with_collaborator(collaborator);
        }
        for page in &self.pages {
            document = document.with_page(PageId::new(&page.id), &page.title, &page.content);
        }
        document
    }
}
