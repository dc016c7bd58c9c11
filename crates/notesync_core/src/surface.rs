//! The rich-text editing surface as seen by the engine.

/// Cursor range in character offsets. `from == to` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Anchor.
    pub from: usize,
    /// Head.
    pub to: usize,
}

impl Selection {
    /// A range.
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// An empty selection at `pos`.
    pub fn caret(pos: usize) -> Self {
        Self { from: pos, to: pos }
    }

    /// Whether nothing is selected.
    pub fn is_caret(&self) -> bool {
        self.from == self.to
    }
}

/// Host-provided editor the engine writes external content into.
///
/// Implementations must not call back into the session synchronously from
/// `replace_content` while expecting the change to be recorded; the session
/// suppresses change callbacks while it applies external content.
pub trait EditingSurface: Send + Sync {
    /// Current selection.
    fn selection(&self) -> Selection;

    /// Replace the whole document and place the selection.
    fn replace_content(&self, content: &str, selection: Selection);
}

/// Clamp `previous` to the bounds of `content`.
///
/// Anchor and head are clamped independently, so a backward selection stays
/// backward.
pub fn restore_selection(previous: Selection, content: &str) -> Selection {
    let len = content.chars().count();
    Selection {
        from: previous.from.min(len),
        to: previous.to.min(len),
    }
}

/// Surface for headless use; discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl EditingSurface for NullSurface {
    fn selection(&self) -> Selection {
        Selection::default()
    }

    fn replace_content(&self, _content: &str, _selection: Selection) {}
}
