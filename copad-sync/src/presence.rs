//! Presence overlay: remote participants' cursors as surface markers.
//!
//! Each remote participant owns at most one live marker at any time. A
//! fresh position always removes the previous marker before installing
//! the next, so repeated updates can never stack decorations or leak
//! handles. Color travels with every update and is handed straight to
//! the marker; there is no shared style registry keyed by participant.

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::CursorPos;
use crate::surface::{EditorSurface, Marker, MarkerId};

/// Maps each remote session id to its currently rendered marker.
#[derive(Debug, Default)]
pub struct PresenceOverlay {
    markers: HashMap<Uuid, MarkerId>,
}

impl PresenceOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a participant's cursor marker to `position`.
    ///
    /// The prior marker, if any, is removed first. A missing position
    /// (malformed event) skips the install, and a surface that cannot
    /// render right now makes the whole call a no-op for the new marker;
    /// neither case is an error.
    pub fn update_cursor(
        &mut self,
        surface: &mut dyn EditorSurface,
        session_id: Uuid,
        username: &str,
        color: &str,
        position: Option<CursorPos>,
    ) {
        if let Some(prev) = self.markers.remove(&session_id) {
            surface.remove_marker(prev);
        }

        let Some(position) = position else {
            log::debug!("cursor update for {session_id} without position, skipping");
            return;
        };

        let marker = Marker {
            position,
            label: username.to_owned(),
            color: color.to_owned(),
        };
        match surface.add_marker(marker) {
            Some(id) => {
                self.markers.insert(session_id, id);
            }
            None => log::debug!("surface not ready, dropping cursor marker for {username}"),
        }
    }

    /// Remove a participant's marker (member left).
    pub fn remove_cursor(&mut self, surface: &mut dyn EditorSurface, session_id: Uuid) {
        if let Some(id) = self.markers.remove(&session_id) {
            surface.remove_marker(id);
        }
    }

    /// Remove every marker (room teardown).
    pub fn clear_all(&mut self, surface: &mut dyn EditorSurface) {
        for (_, id) in self.markers.drain() {
            surface.remove_marker(id);
        }
    }

    /// Handle of the marker currently rendered for a participant.
    pub fn marker_for(&self, session_id: Uuid) -> Option<MarkerId> {
        self.markers.get(&session_id).copied()
    }

    /// Number of participants with a live marker.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::TextBuffer;

    /// Surface that refuses decorations, as a widget does before mount.
    #[derive(Default)]
    struct DetachedSurface;

    impl EditorSurface for DetachedSurface {
        fn text(&self) -> String {
            String::new()
        }
        fn set_text(&mut self, _text: &str) {}
        fn cursor(&self) -> Option<CursorPos> {
            None
        }
        fn add_marker(&mut self, _marker: Marker) -> Option<MarkerId> {
            None
        }
        fn remove_marker(&mut self, _id: MarkerId) {}
    }

    #[test]
    fn test_update_installs_labeled_marker() {
        let mut overlay = PresenceOverlay::new();
        let mut buf = TextBuffer::new();
        let bob = Uuid::new_v4();

        overlay.update_cursor(&mut buf, bob, "Bob", "#3498db", Some(CursorPos::new(1, 4)));

        assert_eq!(buf.marker_count(), 1);
        let marker = buf.marker(overlay.marker_for(bob).unwrap()).unwrap();
        assert_eq!(marker.label, "Bob");
        assert_eq!(marker.color, "#3498db");
        assert_eq!(marker.position, CursorPos::new(1, 4));
    }

    #[test]
    fn test_at_most_one_marker_per_owner() {
        let mut overlay = PresenceOverlay::new();
        let mut buf = TextBuffer::new();
        let bob = Uuid::new_v4();

        overlay.update_cursor(&mut buf, bob, "Bob", "#3498db", Some(CursorPos::new(1, 1)));
        overlay.update_cursor(&mut buf, bob, "Bob", "#3498db", Some(CursorPos::new(2, 1)));

        assert_eq!(buf.marker_count(), 1);
        let marker = buf.marker(overlay.marker_for(bob).unwrap()).unwrap();
        assert_eq!(marker.position.line, 2);
    }

    #[test]
    fn test_two_owners_two_markers() {
        let mut overlay = PresenceOverlay::new();
        let mut buf = TextBuffer::new();

        overlay.update_cursor(
            &mut buf,
            Uuid::new_v4(),
            "Bob",
            "#3498db",
            Some(CursorPos::new(1, 1)),
        );
        overlay.update_cursor(
            &mut buf,
            Uuid::new_v4(),
            "Carol",
            "#16a085",
            Some(CursorPos::new(5, 2)),
        );

        assert_eq!(buf.marker_count(), 2);
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn test_missing_position_skips_install() {
        let mut overlay = PresenceOverlay::new();
        let mut buf = TextBuffer::new();
        let bob = Uuid::new_v4();

        overlay.update_cursor(&mut buf, bob, "Bob", "#3498db", Some(CursorPos::new(1, 1)));
        overlay.update_cursor(&mut buf, bob, "Bob", "#3498db", None);

        // The stale marker is gone and nothing replaced it.
        assert_eq!(buf.marker_count(), 0);
        assert!(overlay.marker_for(bob).is_none());
    }

    #[test]
    fn test_detached_surface_is_noop() {
        let mut overlay = PresenceOverlay::new();
        let mut surface = DetachedSurface;

        overlay.update_cursor(
            &mut surface,
            Uuid::new_v4(),
            "Bob",
            "#3498db",
            Some(CursorPos::new(1, 1)),
        );
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_remove_cursor_idempotent() {
        let mut overlay = PresenceOverlay::new();
        let mut buf = TextBuffer::new();
        let bob = Uuid::new_v4();

        overlay.update_cursor(&mut buf, bob, "Bob", "#3498db", Some(CursorPos::new(1, 1)));
        overlay.remove_cursor(&mut buf, bob);
        overlay.remove_cursor(&mut buf, bob);

        assert_eq!(buf.marker_count(), 0);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_clear_all() {
        let mut overlay = PresenceOverlay::new();
        let mut buf = TextBuffer::new();

        for i in 0..4 {
            overlay.update_cursor(
                &mut buf,
                Uuid::new_v4(),
                &format!("user-{i}"),
                "#f39c12",
                Some(CursorPos::new(i + 1, 1)),
            );
        }
        assert_eq!(buf.marker_count(), 4);

        overlay.clear_all(&mut buf);
        assert_eq!(buf.marker_count(), 0);
        assert!(overlay.is_empty());
    }
}
