//! Save indicator state machine.
//!
//! ```text
//! Saved --edit--> Unsaved --flush--> Saving --ok, nothing left--> Saved
//!                                          \--ok, more pending--> Unsaved
//!                                          \--failure----------> Error
//! ```
//!
//! `Error` is sticky: further edits keep it until a flush succeeds.

use serde::{Deserialize, Serialize};

/// What the save indicator shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// Everything is persisted.
    #[default]
    Saved,
    /// Edits are buffered and waiting for the debounce.
    Unsaved,
    /// A write is in flight.
    Saving,
    /// The last write failed; edits are still buffered.
    Error,
}

impl SaveStatus {
    /// Label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Saved => "Saved",
            SaveStatus::Unsaved => "Unsaved changes",
            SaveStatus::Saving => "Saving...",
            SaveStatus::Error => "Save failed",
        }
    }
}

/// Tracks [`SaveStatus`] plus the message of the last failure.
#[derive(Debug, Clone, Default)]
pub struct SaveStatusModel {
    status: SaveStatus,
    last_error: Option<String>,
}

impl SaveStatusModel {
    /// Start in `Saved`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    /// Message of the failure that put the model in `Error`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// A field was edited.
    pub fn on_edit(&mut self) -> SaveStatus {
        if self.status == SaveStatus::Saved {
            self.status = SaveStatus::Unsaved;
        }
        self.status
    }

    /// A flush started writing.
    pub fn on_flush_started(&mut self) -> SaveStatus {
        self.status = SaveStatus::Saving;
        self.status
    }

    /// A flush completed. `has_pending` says whether edits arrived meanwhile.
    pub fn on_flush_succeeded(&mut self, has_pending: bool) -> SaveStatus {
        self.last_error = None;
        self.status = if has_pending {
            SaveStatus::Unsaved
        } else {
            SaveStatus::Saved
        };
        self.status
    }

    /// A flush failed.
    pub fn on_flush_failed(&mut self, message: impl Into<String>) -> SaveStatus {
        self.last_error = Some(message.into());
        self.status = SaveStatus::Error;
        self.status
    }

    /// Back to `Saved`, e.g. after a document or page switch.
    pub fn reset(&mut self) -> SaveStatus {
        self.last_error = None;
        self.status = SaveStatus::Saved;
        self.status
    }
}
