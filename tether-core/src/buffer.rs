//! Headless editor text model.
//!
//! `TextBuffer` is the editor-side half of a tether binding: a flat string
//! document with the mutation, query and event surface of a code-editor
//! buffer (change stream with line payloads, caret/selection streams,
//! position↔offset conversion). A GUI host embeds it behind its widget;
//! tests and the sync engines drive it directly.
//!
//! Events fire synchronously *after* the mutation they describe, so a
//! handler that translates the event's start position sees the updated
//! content. Text before the start of an insert or delete is untouched by
//! that edit, so the start position's offset is identical before and after
//! the mutation.

use std::cell::{Cell, RefCell};

use crate::events::{Emitter, Subscription};
use crate::position::{self, Position, PositionError};

/// What a [`BufferEdit`] did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Insert,
    Delete,
}

/// One buffer mutation, as reported on the change stream.
///
/// `lines` carries the affected text split on `'\n'`; joining with `'\n'`
/// reconstructs the inserted or removed text exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEdit {
    pub action: EditAction,
    pub start: Position,
    pub lines: Vec<String>,
}

impl BufferEdit {
    /// The inserted or removed text, with line breaks preserved.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Selection anchor/lead pair. The lead is the moving end (the caret);
/// the anchor may sit before or after it in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub lead: Position,
}

impl Selection {
    /// A collapsed (empty) selection at `pos`.
    pub fn collapsed(pos: Position) -> Self {
        Self { anchor: pos, lead: pos }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.lead
    }
}

/// The local text buffer.
pub struct TextBuffer {
    content: RefCell<String>,
    caret: Cell<Position>,
    selection: Cell<Selection>,
    changes: Emitter<BufferEdit>,
    cursor_moves: Emitter<Position>,
    selection_changes: Emitter<Selection>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            content: RefCell::new(String::new()),
            caret: Cell::new(Position::default()),
            selection: Cell::new(Selection::collapsed(Position::default())),
            changes: Emitter::new(),
            cursor_moves: Emitter::new(),
            selection_changes: Emitter::new(),
        }
    }

    pub fn with_value(text: &str) -> Self {
        let buffer = Self::new();
        *buffer.content.borrow_mut() = text.to_owned();
        buffer
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn value(&self) -> String {
        self.content.borrow().clone()
    }

    pub fn len_chars(&self) -> usize {
        self.content.borrow().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.borrow().is_empty()
    }

    pub fn position_to_offset(&self, pos: Position) -> Result<usize, PositionError> {
        position::position_to_offset(&self.content.borrow(), pos)
    }

    pub fn offset_to_position(&self, offset: usize) -> Result<Position, PositionError> {
        position::offset_to_position(&self.content.borrow(), offset)
    }

    pub fn caret(&self) -> Position {
        self.caret.get()
    }

    pub fn selection(&self) -> Selection {
        self.selection.get()
    }

    pub fn selection_is_empty(&self) -> bool {
        self.selection.get().is_empty()
    }

    // ── Event streams ───────────────────────────────────────────────

    /// Subscribe to content mutations.
    pub fn on_change(&self, handler: impl FnMut(&BufferEdit) + 'static) -> Subscription {
        self.changes.subscribe(handler)
    }

    /// Subscribe to caret movement.
    pub fn on_cursor(&self, handler: impl FnMut(&Position) + 'static) -> Subscription {
        self.cursor_moves.subscribe(handler)
    }

    /// Subscribe to selection changes.
    pub fn on_selection(&self, handler: impl FnMut(&Selection) + 'static) -> Subscription {
        self.selection_changes.subscribe(handler)
    }

    // ── Mutation ────────────────────────────────────────────────────

    /// Replace the entire content.
    ///
    /// Reported on the change stream as a whole-buffer delete followed by
    /// a whole-buffer insert, the same shape a full editor emits for a
    /// set-value operation.
    pub fn set_value(&self, text: &str) {
        let old = self.content.replace(text.to_owned());
        self.clamp_marks();
        if !old.is_empty() {
            self.changes.emit(&BufferEdit {
                action: EditAction::Delete,
                start: Position::default(),
                lines: split_lines(&old),
            });
        }
        if !text.is_empty() {
            self.changes.emit(&BufferEdit {
                action: EditAction::Insert,
                start: Position::default(),
                lines: split_lines(text),
            });
        }
    }

    /// Insert `text` at `pos`.
    pub fn insert_at(&self, pos: Position, text: &str) -> Result<(), PositionError> {
        if text.is_empty() {
            return Ok(());
        }
        {
            let mut content = self.content.borrow_mut();
            let offset = position::position_to_offset(&content, pos)?;
            let at = position::byte_index(&content, offset);
            content.insert_str(at, text);
        }
        self.clamp_marks();
        self.changes.emit(&BufferEdit {
            action: EditAction::Insert,
            start: pos,
            lines: split_lines(text),
        });
        Ok(())
    }

    /// Delete the text between `start` and `end`. The endpoints may be
    /// given in either order.
    pub fn delete_range(&self, start: Position, end: Position) -> Result<(), PositionError> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let removed = {
            let mut content = self.content.borrow_mut();
            let start_offset = position::position_to_offset(&content, start)?;
            let end_offset = position::position_to_offset(&content, end)?;
            let from = position::byte_index(&content, start_offset);
            let to = position::byte_index(&content, end_offset);
            let removed = content[from..to].to_owned();
            content.replace_range(from..to, "");
            removed
        };
        if removed.is_empty() {
            return Ok(());
        }
        self.clamp_marks();
        self.changes.emit(&BufferEdit {
            action: EditAction::Delete,
            start,
            lines: split_lines(&removed),
        });
        Ok(())
    }

    // ── Caret and selection ─────────────────────────────────────────

    /// Move the caret, collapsing any selection onto it.
    pub fn set_caret(&self, pos: Position) -> Result<(), PositionError> {
        position::position_to_offset(&self.content.borrow(), pos)?;
        let had_selection = !self.selection.get().is_empty();
        self.caret.set(pos);
        self.selection.set(Selection::collapsed(pos));
        self.cursor_moves.emit(&pos);
        if had_selection {
            self.selection_changes.emit(&Selection::collapsed(pos));
        }
        Ok(())
    }

    /// Select from `anchor` to `lead`, placing the caret at the lead.
    pub fn select(&self, anchor: Position, lead: Position) -> Result<(), PositionError> {
        {
            let content = self.content.borrow();
            position::position_to_offset(&content, anchor)?;
            position::position_to_offset(&content, lead)?;
        }
        let selection = Selection { anchor, lead };
        self.caret.set(lead);
        self.selection.set(selection);
        self.cursor_moves.emit(&lead);
        self.selection_changes.emit(&selection);
        Ok(())
    }

    /// Collapse the selection onto the caret, if it is not already empty.
    pub fn clear_selection(&self) {
        if self.selection.get().is_empty() {
            return;
        }
        let collapsed = Selection::collapsed(self.caret.get());
        self.selection.set(collapsed);
        self.selection_changes.emit(&collapsed);
    }

    /// Keep caret/anchor/lead inside the document after content mutations.
    fn clamp_marks(&self) {
        let content = self.content.borrow();
        self.caret.set(clamp_position(&content, self.caret.get()));
        let selection = self.selection.get();
        self.selection.set(Selection {
            anchor: clamp_position(&content, selection.anchor),
            lead: clamp_position(&content, selection.lead),
        });
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_owned).collect()
}

fn clamp_position(text: &str, pos: Position) -> Position {
    let line_count = text.split('\n').count();
    let line = pos.line.min(line_count - 1);
    let line_len = text
        .split('\n')
        .nth(line)
        .map(|l| l.chars().count())
        .unwrap_or(0);
    Position::new(line, pos.column.min(line_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record_changes(buffer: &TextBuffer) -> (Rc<RefCell<Vec<BufferEdit>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let sub = buffer.on_change(move |edit| sink.borrow_mut().push(edit.clone()));
        (seen, sub)
    }

    #[test]
    fn test_insert_emits_edit_with_line_payload() {
        let buffer = TextBuffer::new();
        let (seen, _sub) = record_changes(&buffer);

        buffer.insert_at(Position::new(0, 0), "ab\ncd").unwrap();

        assert_eq!(buffer.value(), "ab\ncd");
        let edits = seen.borrow();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].action, EditAction::Insert);
        assert_eq!(edits[0].start, Position::new(0, 0));
        assert_eq!(edits[0].lines, vec!["ab".to_owned(), "cd".to_owned()]);
        assert_eq!(edits[0].text(), "ab\ncd");
    }

    #[test]
    fn test_insert_mid_buffer() {
        let buffer = TextBuffer::with_value("hello world");
        buffer.insert_at(Position::new(0, 5), ",").unwrap();
        assert_eq!(buffer.value(), "hello, world");
    }

    #[test]
    fn test_empty_insert_is_silent() {
        let buffer = TextBuffer::new();
        let (seen, _sub) = record_changes(&buffer);
        buffer.insert_at(Position::new(0, 0), "").unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_delete_range_reports_removed_lines() {
        let buffer = TextBuffer::with_value("one\ntwo\nthree");
        let (seen, _sub) = record_changes(&buffer);

        buffer
            .delete_range(Position::new(0, 3), Position::new(1, 3))
            .unwrap();

        assert_eq!(buffer.value(), "one\nthree");
        let edits = seen.borrow();
        assert_eq!(edits[0].action, EditAction::Delete);
        assert_eq!(edits[0].text(), "\ntwo");
    }

    #[test]
    fn test_delete_range_accepts_reversed_endpoints() {
        let buffer = TextBuffer::with_value("abcdef");
        buffer
            .delete_range(Position::new(0, 4), Position::new(0, 1))
            .unwrap();
        assert_eq!(buffer.value(), "aef");
    }

    #[test]
    fn test_set_value_emits_delete_then_insert() {
        let buffer = TextBuffer::with_value("old");
        let (seen, _sub) = record_changes(&buffer);

        buffer.set_value("new text");

        let edits = seen.borrow();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].action, EditAction::Delete);
        assert_eq!(edits[0].text(), "old");
        assert_eq!(edits[1].action, EditAction::Insert);
        assert_eq!(edits[1].text(), "new text");
    }

    #[test]
    fn test_set_value_from_empty_emits_only_insert() {
        let buffer = TextBuffer::new();
        let (seen, _sub) = record_changes(&buffer);
        buffer.set_value("hello");
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].action, EditAction::Insert);
    }

    #[test]
    fn test_marks_clamped_when_content_shrinks() {
        let buffer = TextBuffer::with_value("line one\nline two");
        buffer.set_caret(Position::new(1, 8)).unwrap();

        buffer.set_value("ab");

        assert_eq!(buffer.caret(), Position::new(0, 2));
        assert!(buffer.selection_is_empty());
    }

    #[test]
    fn test_set_caret_collapses_selection_and_notifies() {
        let buffer = TextBuffer::with_value("abcdef");
        buffer
            .select(Position::new(0, 1), Position::new(0, 4))
            .unwrap();

        let cursor_seen = Rc::new(RefCell::new(Vec::new()));
        let selection_seen = Rc::new(RefCell::new(Vec::new()));
        let cs = cursor_seen.clone();
        let ss = selection_seen.clone();
        let _c = buffer.on_cursor(move |pos| cs.borrow_mut().push(*pos));
        let _s = buffer.on_selection(move |sel| ss.borrow_mut().push(*sel));

        buffer.set_caret(Position::new(0, 2)).unwrap();

        assert_eq!(*cursor_seen.borrow(), vec![Position::new(0, 2)]);
        assert_eq!(
            *selection_seen.borrow(),
            vec![Selection::collapsed(Position::new(0, 2))]
        );
        assert!(buffer.selection_is_empty());
    }

    #[test]
    fn test_select_places_caret_at_lead() {
        let buffer = TextBuffer::with_value("abcdef");
        buffer
            .select(Position::new(0, 5), Position::new(0, 2))
            .unwrap();
        assert_eq!(buffer.caret(), Position::new(0, 2));
        assert!(!buffer.selection_is_empty());
        assert_eq!(buffer.selection().anchor, Position::new(0, 5));
    }

    #[test]
    fn test_clear_selection_is_silent_when_already_empty() {
        let buffer = TextBuffer::with_value("abc");
        let seen = Rc::new(RefCell::new(0u32));
        let s = seen.clone();
        let _sub = buffer.on_selection(move |_| *s.borrow_mut() += 1);

        buffer.clear_selection();
        assert_eq!(*seen.borrow(), 0);

        buffer
            .select(Position::new(0, 0), Position::new(0, 2))
            .unwrap();
        buffer.clear_selection();
        assert_eq!(*seen.borrow(), 2); // select + clear
    }

    #[test]
    fn test_out_of_range_positions_are_rejected() {
        let buffer = TextBuffer::with_value("ab");
        assert!(buffer.insert_at(Position::new(3, 0), "x").is_err());
        assert!(buffer.set_caret(Position::new(0, 7)).is_err());
        assert!(buffer
            .delete_range(Position::new(0, 0), Position::new(0, 9))
            .is_err());
    }

    #[test]
    fn test_multibyte_content_edits() {
        let buffer = TextBuffer::with_value("γδ");
        buffer.insert_at(Position::new(0, 1), "x").unwrap();
        assert_eq!(buffer.value(), "γxδ");
        buffer
            .delete_range(Position::new(0, 0), Position::new(0, 2))
            .unwrap();
        assert_eq!(buffer.value(), "δ");
    }
}
