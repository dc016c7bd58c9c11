//! # `notesync_core`
//!
//! Editing synchronization engine for a note-taking client.
//!
//! The engine keeps the open note consistent across:
//! 1. the user's own keystrokes,
//! 2. debounced saves to the persistence backend,
//! 3. edits broadcast by other participants on a collaboration channel,
//! 4. switching between pages of a note or between notes.
//!
//! Hosts provide a [`PersistenceClient`], optionally a [`CollabChannel`], and
//! an [`EditingSurface`], then drive an [`EditorSession`] and a
//! [`FetchCoordinator`]. The [`memory`] module has in-memory versions of all
//! three collaborators.

#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod debounce;
pub mod edit_buffer;
pub mod error;
pub mod fetch;
pub mod memory;
pub mod page_switch;
pub mod reconciler;
pub mod save_status;
pub mod session;
pub mod surface;
pub mod types;

pub use cache::{DocumentCache, EntityCache};
pub use client::{CollabChannel, ConnectionStatus, PersistenceClient};
pub use config::{ConfigError, EngineConfig};
pub use debounce::Debouncer;
pub use edit_buffer::{Baseline, EditBuffer};
pub use error::{ClientError, ClientErrorKind, Result, SyncError};
pub use fetch::{DocumentView, FetchCoordinator, SelectOutcome};
pub use page_switch::{ContentTarget, PageCreationPlan, PageSwitchCoordinator};
pub use reconciler::{ReconcilePhase, RemoteDecision, RemoteReconciler};
pub use save_status::{SaveStatus, SaveStatusModel};
pub use session::{ChangeOutcome, EditorSession};
pub use surface::{EditingSurface, NullSurface, Selection};
pub use types::{Document, DocumentId, DocumentPatch, Field, Page, PageId, PageInput, RemoteUpdate};
