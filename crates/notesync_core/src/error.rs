//! Error types for the sync engine.
//!
//! Nothing here is fatal: every variant describes a per-document or
//! per-operation failure the user can recover from by retrying.

use std::fmt;

use thiserror::Error;

use crate::types::{DocumentId, PageId};

/// Coarse classification of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// The entity does not exist on the server.
    NotFound,
    /// The server or channel could not be reached.
    Unavailable,
    /// The server refused the request.
    Rejected,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClientErrorKind::NotFound => "not found",
            ClientErrorKind::Unavailable => "unavailable",
            ClientErrorKind::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Failure reported by a [`PersistenceClient`](crate::client::PersistenceClient)
/// or [`CollabChannel`](crate::client::CollabChannel) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClientError {
    /// Failure class.
    pub kind: ClientErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ClientError {
    /// Build an error of the given kind.
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Entity missing.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::NotFound, message)
    }

    /// Backend unreachable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Unavailable, message)
    }

    /// Request refused.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Rejected, message)
    }
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Persisting buffered edits failed. The edits stay buffered.
    #[error("Failed to save changes: {0}")]
    Save(#[source] ClientError),

    /// A page operation (create, delete, rename) failed on the server.
    #[error("Page request failed: {0}")]
    Request(#[from] ClientError),

    /// Deleting the only remaining page of a document is never sent.
    #[error("Cannot delete the last page of document {0}")]
    LastPage(DocumentId),

    /// The page is not part of the open document.
    #[error("Page {page} not found in document {document}")]
    PageNotFound {
        /// Open document.
        document: DocumentId,
        /// Missing page.
        page: PageId,
    },

    /// The operation needs an open document.
    #[error("No document is open")]
    NoDocument,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
