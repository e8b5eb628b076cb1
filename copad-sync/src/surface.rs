//! The editing-surface seam.
//!
//! The synchronization engine never talks to a concrete editor widget.
//! It drives anything implementing [`EditorSurface`]: read the current
//! text, replace it wholesale, read the local cursor, and decorate
//! positions with labeled markers. [`TextBuffer`] is the in-memory
//! implementation used by the terminal frontend and by tests.

use std::collections::HashMap;

use crate::protocol::CursorPos;

/// Opaque handle to one installed marker, minted by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// A zero-width visual annotation at a position: a caret line in the
/// participant's color with their name as an inline label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub position: CursorPos,
    pub label: String,
    pub color: String,
}

/// Contract the engine requires from an editing surface.
///
/// `add_marker` returns `None` when the surface is not ready to render
/// decorations (e.g. a widget that has not mounted yet); callers treat
/// that as a silent skip, never an error.
pub trait EditorSurface {
    /// Current full document text.
    fn text(&self) -> String;

    /// Replace the full document text.
    fn set_text(&mut self, text: &str);

    /// The local cursor position, if the surface has one.
    fn cursor(&self) -> Option<CursorPos>;

    /// Install a marker, returning its handle, or `None` if the surface
    /// cannot render decorations right now.
    fn add_marker(&mut self, marker: Marker) -> Option<MarkerId>;

    /// Remove a previously installed marker. Unknown handles are ignored.
    fn remove_marker(&mut self, id: MarkerId);
}

/// Plain in-memory editing surface.
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
    cursor: Option<CursorPos>,
    markers: HashMap<MarkerId, Marker>,
    next_marker: u64,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the local cursor (host-side input, not a remote marker).
    pub fn move_cursor(&mut self, position: CursorPos) {
        self.cursor = Some(position);
    }

    /// Number of markers currently installed.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Look up an installed marker by handle.
    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Iterate over all installed markers.
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }
}

impl EditorSurface for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_owned();
    }

    fn cursor(&self) -> Option<CursorPos> {
        self.cursor
    }

    fn add_marker(&mut self, marker: Marker) -> Option<MarkerId> {
        self.next_marker += 1;
        let id = MarkerId(self.next_marker);
        self.markers.insert(id, marker);
        Some(id)
    }

    fn remove_marker(&mut self, id: MarkerId) {
        self.markers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read_text() {
        let mut buf = TextBuffer::new();
        assert_eq!(buf.text(), "");

        buf.set_text("print(1)");
        assert_eq!(buf.text(), "print(1)");
    }

    #[test]
    fn test_cursor_starts_unset() {
        let buf = TextBuffer::new();
        assert!(buf.cursor().is_none());
    }

    #[test]
    fn test_move_cursor() {
        let mut buf = TextBuffer::new();
        buf.move_cursor(CursorPos::new(2, 5));
        assert_eq!(buf.cursor(), Some(CursorPos::new(2, 5)));
    }

    #[test]
    fn test_markers_have_distinct_handles() {
        let mut buf = TextBuffer::new();
        let a = buf
            .add_marker(Marker {
                position: CursorPos::new(1, 1),
                label: "Alice".into(),
                color: "#e74c3c".into(),
            })
            .unwrap();
        let b = buf
            .add_marker(Marker {
                position: CursorPos::new(2, 1),
                label: "Bob".into(),
                color: "#3498db".into(),
            })
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(buf.marker_count(), 2);
    }

    #[test]
    fn test_remove_marker_unknown_handle_ignored() {
        let mut buf = TextBuffer::new();
        buf.remove_marker(MarkerId(99));
        assert_eq!(buf.marker_count(), 0);
    }

    #[test]
    fn test_remove_marker() {
        let mut buf = TextBuffer::new();
        let id = buf
            .add_marker(Marker {
                position: CursorPos::new(1, 1),
                label: "Alice".into(),
                color: "#e74c3c".into(),
            })
            .unwrap();

        buf.remove_marker(id);
        assert_eq!(buf.marker_count(), 0);
        assert!(buf.marker(id).is_none());
    }
}
