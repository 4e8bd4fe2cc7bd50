//! Remote-presence overlays: per-session colored carets and highlights.
//!
//! `OverlaySet` is the editor-side rendering surface for remote cursors
//! and selections. Each overlay is keyed by the owning session id and
//! carries a display label (the username) and a stable color. The set
//! only models overlay *state*; a GUI host reads it to draw.
//!
//! Highlights require an ordered range (start ≤ end). Normalizing an
//! order-independent wire range is the caller's job; inverted input here
//! is rejected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::position::Position;

/// RGBA display color for a remote caret or highlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl CursorColor {
    /// Stable, visually distinct color derived from a session id.
    ///
    /// Hue comes from the id hash; saturation and lightness are fixed high
    /// so every cursor stays vivid against the text.
    pub fn from_uuid(id: Uuid) -> Self {
        let hash = id.as_u128();
        let hue = ((hash % 360) as f32) / 360.0;
        let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.6);
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for CursorColor {
    fn default() -> Self {
        Self { r: 0.26, g: 0.52, b: 0.96, a: 1.0 }
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// A remote participant's caret overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCaret {
    pub session_id: Uuid,
    pub label: String,
    pub color: CursorColor,
    /// `None` while the caret is hidden (cleared or never set).
    pub position: Option<Position>,
}

/// A remote participant's selection-highlight overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteHighlight {
    pub session_id: Uuid,
    pub label: String,
    pub color: CursorColor,
    /// Ordered range, `None` while hidden.
    pub range: Option<(Position, Position)>,
}

/// Overlay update failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    UnknownSession(Uuid),
    InvertedRange { start: Position, end: Position },
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSession(id) => write!(f, "no overlay registered for session {id}"),
            Self::InvertedRange { start, end } => {
                write!(f, "highlight range {start}..{end} is inverted")
            }
        }
    }
}

impl std::error::Error for OverlayError {}

/// All remote-presence overlays of one editor surface.
#[derive(Debug, Default)]
pub struct OverlaySet {
    carets: RefCell<HashMap<Uuid, RemoteCaret>>,
    highlights: RefCell<HashMap<Uuid, RemoteHighlight>>,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Carets ──────────────────────────────────────────────────────

    /// Register a caret overlay for `session_id`. Replaces any existing
    /// caret for that session; the caret starts hidden.
    pub fn add_caret(&self, session_id: Uuid, label: &str, color: CursorColor) {
        self.carets.borrow_mut().insert(
            session_id,
            RemoteCaret {
                session_id,
                label: label.to_owned(),
                color,
                position: None,
            },
        );
    }

    pub fn set_caret(&self, session_id: Uuid, pos: Position) -> Result<(), OverlayError> {
        let mut carets = self.carets.borrow_mut();
        let caret = carets
            .get_mut(&session_id)
            .ok_or(OverlayError::UnknownSession(session_id))?;
        caret.position = Some(pos);
        Ok(())
    }

    /// Hide the caret without removing its registration.
    pub fn clear_caret(&self, session_id: Uuid) -> Result<(), OverlayError> {
        let mut carets = self.carets.borrow_mut();
        let caret = carets
            .get_mut(&session_id)
            .ok_or(OverlayError::UnknownSession(session_id))?;
        caret.position = None;
        Ok(())
    }

    pub fn remove_caret(&self, session_id: Uuid) -> Option<RemoteCaret> {
        self.carets.borrow_mut().remove(&session_id)
    }

    pub fn caret(&self, session_id: Uuid) -> Option<RemoteCaret> {
        self.carets.borrow().get(&session_id).cloned()
    }

    pub fn caret_count(&self) -> usize {
        self.carets.borrow().len()
    }

    // ── Highlights ──────────────────────────────────────────────────

    /// Register a highlight overlay for `session_id`. Starts hidden.
    pub fn add_highlight(&self, session_id: Uuid, label: &str, color: CursorColor) {
        self.highlights.borrow_mut().insert(
            session_id,
            RemoteHighlight {
                session_id,
                label: label.to_owned(),
                color,
                range: None,
            },
        );
    }

    /// Show the highlight over `start..end`. The range must be ordered.
    pub fn set_highlight(
        &self,
        session_id: Uuid,
        start: Position,
        end: Position,
    ) -> Result<(), OverlayError> {
        if start > end {
            return Err(OverlayError::InvertedRange { start, end });
        }
        let mut highlights = self.highlights.borrow_mut();
        let highlight = highlights
            .get_mut(&session_id)
            .ok_or(OverlayError::UnknownSession(session_id))?;
        highlight.range = Some((start, end));
        Ok(())
    }

    /// Hide the highlight without removing its registration.
    pub fn clear_highlight(&self, session_id: Uuid) -> Result<(), OverlayError> {
        let mut highlights = self.highlights.borrow_mut();
        let highlight = highlights
            .get_mut(&session_id)
            .ok_or(OverlayError::UnknownSession(session_id))?;
        highlight.range = None;
        Ok(())
    }

    pub fn remove_highlight(&self, session_id: Uuid) -> Option<RemoteHighlight> {
        self.highlights.borrow_mut().remove(&session_id)
    }

    pub fn highlight(&self, session_id: Uuid) -> Option<RemoteHighlight> {
        self.highlights.borrow().get(&session_id).cloned()
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights.borrow().len()
    }

    /// Drop every overlay. Used on full disconnect.
    pub fn clear_all(&self) {
        self.carets.borrow_mut().clear();
        self.highlights.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_uuid_is_stable() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(CursorColor::from_uuid(id), CursorColor::from_uuid(id));
    }

    #[test]
    fn test_color_channels_in_range() {
        let color = CursorColor::from_uuid(Uuid::new_v4());
        for channel in color.to_array() {
            assert!((0.0..=1.0).contains(&channel));
        }
        assert_eq!(color.a, 1.0);
    }

    #[test]
    fn test_hsl_red() {
        let (r, g, b) = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((r - 1.0).abs() < 0.01);
        assert!(g.abs() < 0.01);
        assert!(b.abs() < 0.01);
    }

    #[test]
    fn test_caret_lifecycle() {
        let overlays = OverlaySet::new();
        let id = Uuid::new_v4();

        overlays.add_caret(id, "alice", CursorColor::default());
        assert_eq!(overlays.caret_count(), 1);
        assert_eq!(overlays.caret(id).unwrap().position, None);

        overlays.set_caret(id, Position::new(1, 2)).unwrap();
        assert_eq!(overlays.caret(id).unwrap().position, Some(Position::new(1, 2)));

        overlays.clear_caret(id).unwrap();
        assert_eq!(overlays.caret(id).unwrap().position, None);
        assert_eq!(overlays.caret_count(), 1);

        let removed = overlays.remove_caret(id).unwrap();
        assert_eq!(removed.label, "alice");
        assert_eq!(overlays.caret_count(), 0);
    }

    #[test]
    fn test_unknown_session_rejected() {
        let overlays = OverlaySet::new();
        let id = Uuid::new_v4();
        assert_eq!(
            overlays.set_caret(id, Position::new(0, 0)),
            Err(OverlayError::UnknownSession(id))
        );
        assert_eq!(
            overlays.set_highlight(id, Position::new(0, 0), Position::new(0, 1)),
            Err(OverlayError::UnknownSession(id))
        );
    }

    #[test]
    fn test_inverted_highlight_rejected() {
        let overlays = OverlaySet::new();
        let id = Uuid::new_v4();
        overlays.add_highlight(id, "bob", CursorColor::default());

        let start = Position::new(2, 0);
        let end = Position::new(1, 4);
        assert_eq!(
            overlays.set_highlight(id, start, end),
            Err(OverlayError::InvertedRange { start, end })
        );
        // Registration is untouched by the rejected update.
        assert_eq!(overlays.highlight(id).unwrap().range, None);
    }

    #[test]
    fn test_highlight_set_and_clear() {
        let overlays = OverlaySet::new();
        let id = Uuid::new_v4();
        overlays.add_highlight(id, "bob", CursorColor::default());

        overlays
            .set_highlight(id, Position::new(0, 1), Position::new(0, 5))
            .unwrap();
        assert_eq!(
            overlays.highlight(id).unwrap().range,
            Some((Position::new(0, 1), Position::new(0, 5)))
        );

        overlays.clear_highlight(id).unwrap();
        assert_eq!(overlays.highlight(id).unwrap().range, None);
    }

    #[test]
    fn test_clear_all() {
        let overlays = OverlaySet::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        overlays.add_caret(a, "a", CursorColor::default());
        overlays.add_highlight(b, "b", CursorColor::default());

        overlays.clear_all();
        assert_eq!(overlays.caret_count(), 0);
        assert_eq!(overlays.highlight_count(), 0);
    }
}
