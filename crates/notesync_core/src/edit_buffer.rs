//! Per-surface buffer of edits not yet confirmed by the server.
//!
//! The buffer keeps a baseline (the last values known to be persisted) and
//! at most one pending value per field. Each recorded edit gets a revision
//! number so that a flush completing after newer keystrokes only clears what
//! it actually wrote.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::{DocumentPatch, Field};

/// Last values known to match the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    /// Document title.
    pub title: String,
    /// Content of the active surface.
    pub content: String,
}

impl Baseline {
    /// Build a baseline.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Value of one field.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Content => &self.content,
        }
    }

    /// Overwrite one field.
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        match field {
            Field::Title => self.title = value.into(),
            Field::Content => self.content = value.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingField {
    value: String,
    revision: u64,
}

/// Values taken out of the buffer for one flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushCandidate {
    /// Title to write, if changed.
    pub title: Option<String>,
    /// Content to write, if changed.
    pub content: Option<String>,
    title_revision: Option<u64>,
    content_revision: Option<u64>,
    generation: u64,
}

impl FlushCandidate {
    /// Patch carrying every field of the candidate.
    pub fn patch(&self) -> DocumentPatch {
        DocumentPatch {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// Pending edits for the active surface.
#[derive(Debug, Default)]
pub struct EditBuffer {
    baseline: Baseline,
    generation: u64,
    title: Option<PendingField>,
    content: Option<PendingField>,
    next_revision: u64,
    last_edit_at: Option<Instant>,
}

impl EditBuffer {
    /// Empty buffer over `baseline`.
    pub fn new(baseline: Baseline) -> Self {
        Self {
            baseline,
            ..Self::default()
        }
    }

    /// Last persisted values.
    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Record a local edit made at `now`.
    pub fn record(&mut self, field: Field, value: impl Into<String>, now: Instant) {
        self.next_revision += 1;
        let pending = PendingField {
            value: value.into(),
            revision: self.next_revision,
        };
        match field {
            Field::Title => self.title = Some(pending),
            Field::Content => self.content = Some(pending),
        }
        self.last_edit_at = Some(now);
    }

    /// Buffered value of `field`, if any.
    pub fn pending(&self, field: Field) -> Option<&str> {
        self.slot(field).as_ref().map(|p| p.value.as_str())
    }

    /// Whether anything is buffered.
    pub fn has_pending(&self) -> bool {
        self.title.is_some() || self.content.is_some()
    }

    /// Pending value if present, baseline otherwise.
    pub fn current(&self, field: Field) -> &str {
        self.pending(field).unwrap_or_else(|| self.baseline.get(field))
    }

    /// Take what a flush should write.
    ///
    /// Pending values that already equal the baseline are dropped first, so
    /// a flush with nothing changed returns `None` and makes no request.
    pub fn snapshot(&mut self) -> Option<FlushCandidate> {
        if self
            .title
            .as_ref()
            .is_some_and(|p| p.value == self.baseline.title)
        {
            self.title = None;
        }
        if self
            .content
            .as_ref()
            .is_some_and(|p| p.value == self.baseline.content)
        {
            self.content = None;
        }
        if !self.has_pending() {
            return None;
        }

        Some(FlushCandidate {
            title: self.title.as_ref().map(|p| p.value.clone()),
            content: self.content.as_ref().map(|p| p.value.clone()),
            title_revision: self.title.as_ref().map(|p| p.revision),
            content_revision: self.content.as_ref().map(|p| p.revision),
            generation: self.generation,
        })
    }

    /// A flush of `candidate` succeeded.
    ///
    /// Fields edited again since the snapshot stay pending. The baseline is
    /// only advanced if it was not replaced while the write was in flight.
    pub fn complete(&mut self, candidate: &FlushCandidate) {
        if candidate.title_revision.is_some()
            && self.title.as_ref().map(|p| p.revision) == candidate.title_revision
        {
            self.title = None;
        }
        if candidate.content_revision.is_some()
            && self.content.as_ref().map(|p| p.revision) == candidate.content_revision
        {
            self.content = None;
        }

        if candidate.generation == self.generation {
            if let Some(title) = &candidate.title {
                self.baseline.title = title.clone();
            }
            if let Some(content) = &candidate.content {
                self.baseline.content = content.clone();
            }
        }
    }

    /// The server is known to hold `baseline`; pending edits are kept.
    pub fn advance_baseline(&mut self, baseline: Baseline) {
        self.baseline = baseline;
    }

    /// External content replaced the surface. In-flight flushes can no
    /// longer advance the baseline.
    pub fn replace_baseline(&mut self, baseline: Baseline) {
        self.generation += 1;
        self.baseline = baseline;
    }

    /// Forget buffered edits.
    pub fn discard_pending(&mut self) {
        self.title = None;
        self.content = None;
    }

    /// Start over on a new surface.
    pub fn reset(&mut self, baseline: Baseline) {
        self.replace_baseline(baseline);
        self.discard_pending();
        self.last_edit_at = None;
    }

    /// Forget when the last edit happened.
    pub fn clear_editing(&mut self) {
        self.last_edit_at = None;
    }

    /// Time of the last local edit.
    pub fn last_edit_at(&self) -> Option<Instant> {
        self.last_edit_at
    }

    /// Whether a local edit happened within `guard` before `now`.
    pub fn is_recently_edited(&self, now: Instant, guard: Duration) -> bool {
        self.last_edit_at
            .is_some_and(|at| now.saturating_duration_since(at) < guard)
    }

    fn slot(&self, field: Field) -> &Option<PendingField> {
        match field {
            Field::Title => &self.title,
            Field::Content => &self.content,
        }
    }
}
