use super::document::{Document, NodeId, NodeKind};
use crate::util::utf16_len;

/// A caret position: UTF-16 offset inside a text node, or child index inside an element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn collapsed(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// `true` while both ends point at attached nodes with in-range offsets.
    pub fn is_valid_in(&self, doc: &Document) -> bool {
        position_valid(doc, self.start) && position_valid(doc, self.end)
    }
}

fn position_valid(doc: &Document, pos: Position) -> bool {
    if !doc.contains(pos.node) || !doc.is_attached(pos.node) {
        return false;
    }
    match doc.kind(pos.node) {
        Some(NodeKind::Text(t)) => pos.offset <= utf16_len(t),
        Some(NodeKind::Element { .. }) => pos.offset <= doc.children(pos.node).len(),
        None => false,
    }
}

/// A selection captured against one document revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SelectionSnapshot {
    selection: Selection,
    revision: u64,
}

/// Holds at most one snapshot of the live cursor.
///
/// A snapshot is single-use: [`SelectionTracker::take`] consumes it, and it is refused once
/// the document has been mutated since capture.
#[derive(Clone, Debug, Default)]
pub(crate) struct SelectionTracker {
    snapshot: Option<SelectionSnapshot>,
}

impl SelectionTracker {
    pub fn capture(&mut self, doc: &Document, live: Option<Selection>) -> bool {
        self.snapshot = live
            .filter(|sel| sel.is_valid_in(doc))
            .map(|selection| SelectionSnapshot {
                selection,
                revision: doc.revision(),
            });
        self.snapshot.is_some()
    }

    #[cfg(test)]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
    }

    /// Consume the snapshot, returning it only if still valid for `doc`.
    pub fn take(&mut self, doc: &Document) -> Option<Selection> {
        let snap = self.snapshot.take()?;
        if snap.revision != doc.revision() {
            tracing::debug!(
                captured = snap.revision,
                current = doc.revision(),
                "selection snapshot is stale"
            );
            return None;
        }
        Some(snap.selection).filter(|sel| sel.is_valid_in(doc))
    }
}
