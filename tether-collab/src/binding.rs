//! Text sync engine: local buffer ↔ shared document.
//!
//! Outbound, a buffer edit is translated to a char offset and appended to
//! the shared document as an insert or remove — unless the suppression
//! context says the edit was itself caused by an inbound apply, in which
//! case it is not echoed. Inbound, each remote document event mutates the
//! buffer under a suppression guard whose release is guaranteed on every
//! exit path.
//!
//! Binding performs one synchronous full-replace from the shared
//! document's snapshot *before* the outbound listener exists, so the two
//! sides start identical.
//!
//! When translation or mutation fails on either path the two replicas
//! have already diverged; the handler reports the fault and answers with
//! a full-replace resynchronization from the shared snapshot instead of a
//! partial repair.

use std::fmt;
use std::rc::Rc;

use tether_core::buffer::{BufferEdit, EditAction, TextBuffer};
use tether_core::events::Subscription;
use tether_core::position::{Position, PositionError};

use crate::document::{DocError, DocHandle};
use crate::protocol::DocEvent;
use crate::suppress::SuppressionContext;

/// Text sync engine failure.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingError {
    /// A host editor reported an action this engine does not recognize.
    /// Dropping it silently would desynchronize the replicas, so it is
    /// surfaced instead.
    UnknownEditAction(String),
    Position(PositionError),
    Doc(DocError),
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEditAction(action) => write!(f, "unknown edit action: {action:?}"),
            Self::Position(e) => write!(f, "position translation failed: {e}"),
            Self::Doc(e) => write!(f, "shared document rejected operation: {e}"),
        }
    }
}

impl std::error::Error for BindingError {}

impl From<PositionError> for BindingError {
    fn from(e: PositionError) -> Self {
        Self::Position(e)
    }
}

impl From<DocError> for BindingError {
    fn from(e: DocError) -> Self {
        Self::Doc(e)
    }
}

/// Two-way binding between one buffer and one shared-document session.
pub struct TextBinding {
    buffer: Rc<TextBuffer>,
    handle: DocHandle,
    subs: Vec<Subscription>,
}

impl TextBinding {
    /// Attach `buffer` to `handle`.
    ///
    /// The suppression context must be the same one given to the presence
    /// binding of this editor, and must not be shared across editors.
    pub fn bind(buffer: Rc<TextBuffer>, handle: DocHandle, ctx: SuppressionContext) -> Self {
        // Initial sync, before the outbound listener can observe it.
        {
            let _guard = ctx.enter();
            buffer.set_value(&handle.value());
        }

        let mut subs = Vec::with_capacity(2);

        let inbound = {
            let buffer = Rc::clone(&buffer);
            let snapshot = handle.clone();
            let ctx = ctx.clone();
            handle.on_doc_event(move |event| {
                apply_remote(&buffer, &snapshot, &ctx, event);
            })
        };
        subs.push(inbound);

        let outbound = {
            let target = handle.clone();
            let ctx = ctx.clone();
            let forward_buffer = Rc::clone(&buffer);
            buffer.on_change(move |edit| {
                if ctx.is_suppressed() {
                    return;
                }
                if let Err(e) = forward_local(&forward_buffer, &target, edit) {
                    log::error!("outbound edit failed ({e}); resynchronizing from shared document");
                    let _guard = ctx.enter();
                    forward_buffer.set_value(&target.value());
                }
            })
        };
        subs.push(outbound);

        Self { buffer, handle, subs }
    }

    pub fn handle(&self) -> &DocHandle {
        &self.handle
    }

    /// Ingress point for host editors that report edits as raw action
    /// names. Validates the action, then drives the buffer; the change
    /// listener forwards the edit outward as usual.
    pub fn apply_editor_delta(
        &self,
        action: &str,
        start: Position,
        lines: &[String],
    ) -> Result<(), BindingError> {
        let action = match action {
            "insert" => EditAction::Insert,
            "delete" => EditAction::Delete,
            other => return Err(BindingError::UnknownEditAction(other.to_owned())),
        };
        let text = lines.join("\n");
        match action {
            EditAction::Insert => self.buffer.insert_at(start, &text)?,
            EditAction::Delete => {
                let start_offset = self.buffer.position_to_offset(start)?;
                let end = self
                    .buffer
                    .offset_to_position(start_offset + text.chars().count())?;
                self.buffer.delete_range(start, end)?;
            }
        }
        Ok(())
    }

    /// Deterministically unregister both listeners. The buffer and the
    /// session keep their current state.
    pub fn detach(&mut self) {
        self.subs.clear();
    }
}

fn forward_local(
    buffer: &TextBuffer,
    handle: &DocHandle,
    edit: &BufferEdit,
) -> Result<(), BindingError> {
    let offset = buffer.position_to_offset(edit.start)?;
    let text = edit.text();
    match edit.action {
        EditAction::Insert => handle.insert(offset, &text)?,
        EditAction::Delete => handle.remove(offset, text.chars().count())?,
    }
    Ok(())
}

fn apply_remote(
    buffer: &TextBuffer,
    handle: &DocHandle,
    ctx: &SuppressionContext,
    event: &DocEvent,
) {
    let _guard = ctx.enter();
    let applied = match event {
        DocEvent::Insert { index, text } => buffer
            .offset_to_position(*index)
            .and_then(|pos| buffer.insert_at(pos, text)),
        DocEvent::Remove { index, len } => buffer.offset_to_position(*index).and_then(|start| {
            let end = buffer.offset_to_position(index + len)?;
            buffer.delete_range(start, end)
        }),
        DocEvent::Replace { text } => {
            buffer.set_value(text);
            Ok(())
        }
    };
    if let Err(e) = applied {
        // The replicas disagree; a partial repair would make it worse.
        log::error!("inbound apply failed ({e}); resynchronizing from shared document");
        buffer.set_value(&handle.value());
    }
}
