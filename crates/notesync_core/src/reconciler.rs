//! Decides what to do with updates arriving from the collaboration channel.
//!
//! The reconciler is a small state machine:
//!
//! ```text
//! Idle --local change--> LocalEditing --save settled--> Idle
//!   \                                                  ^
//!    \--remote applied--> ApplyingRemote --settle-----/
//! ```
//!
//! Local change callbacks are dropped while in `ApplyingRemote`, since they
//! are side effects of the engine writing remote content into the surface.
//! Remote updates are last-writer-wins, except that they may not replace
//! content the user typed within the guard window or edits not yet saved.

use std::time::Duration;

use tokio::time::Instant;

use crate::edit_buffer::{Baseline, EditBuffer};
use crate::types::{Document, RemoteUpdate};

/// Reconciler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePhase {
    /// Nothing in progress.
    #[default]
    Idle,
    /// A remote update was just written to the surface.
    ApplyingRemote,
    /// The user is typing.
    LocalEditing,
}

/// Outcome of [`RemoteReconciler::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDecision {
    /// The update matches the baseline; nothing to do.
    Unchanged,
    /// The update matches what is displayed. Only the baseline moves.
    Adopt,
    /// The user typed within the guard window or has unsaved edits; the
    /// update is dropped.
    Defer,
    /// Overwrite local state with the update.
    Apply,
}

/// Tracks [`ReconcilePhase`] and applies the guard window.
#[derive(Debug, Clone)]
pub struct RemoteReconciler {
    phase: ReconcilePhase,
    guard_window: Duration,
}

impl RemoteReconciler {
    /// Create an idle reconciler.
    pub fn new(guard_window: Duration) -> Self {
        Self {
            phase: ReconcilePhase::Idle,
            guard_window,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ReconcilePhase {
        self.phase
    }

    /// The guard window.
    pub fn guard_window(&self) -> Duration {
        self.guard_window
    }

    /// The surface reported a change. Returns false when the change is an
    /// echo of remote content and must be ignored.
    pub fn on_local_change(&mut self) -> bool {
        if self.phase == ReconcilePhase::ApplyingRemote {
            return false;
        }
        self.phase = ReconcilePhase::LocalEditing;
        true
    }

    /// Classify an incoming update.
    ///
    /// `displayed` is what the surface currently shows.
    pub fn decide(
        &self,
        update: &Baseline,
        buffer: &EditBuffer,
        displayed: &Baseline,
        now: Instant,
    ) -> RemoteDecision {
        if update == buffer.baseline() {
            RemoteDecision::Unchanged
        } else if update == displayed {
            RemoteDecision::Adopt
        } else if buffer.has_pending() || buffer.is_recently_edited(now, self.guard_window) {
            RemoteDecision::Defer
        } else {
            RemoteDecision::Apply
        }
    }

    /// Remote content is about to be written to the surface.
    pub fn begin_remote(&mut self) {
        self.phase = ReconcilePhase::ApplyingRemote;
    }

    /// The surface had time to settle after a remote write.
    pub fn settle(&mut self) {
        if self.phase == ReconcilePhase::ApplyingRemote {
            self.phase = ReconcilePhase::Idle;
        }
    }

    /// Buffered local edits were persisted.
    pub fn finish_local_editing(&mut self) {
        if self.phase == ReconcilePhase::LocalEditing {
            self.phase = ReconcilePhase::Idle;
        }
    }

    /// Back to `Idle`.
    pub fn reset(&mut self) {
        self.phase = ReconcilePhase::Idle;
    }
}

/// Convert an incoming event into the values it would display.
pub fn update_values(update: &RemoteUpdate) -> Baseline {
    Baseline::new(update.title.clone(), update.content.clone())
}

/// Whether `viewer_id` should join the collaboration channel for `document`.
pub fn should_join(document: &Document, viewer_id: &str) -> bool {
    document.is_shared_with(viewer_id)
}
