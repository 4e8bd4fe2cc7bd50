//! Reference sync engine: cursor/selection presence in both directions.
//!
//! Outbound, the local caret is republished on every unsuppressed cursor
//! event and the local selection on every unsuppressed selection event
//! (cleared when the selection collapses). Inbound, remote references are
//! discovered — enumerated at attach time or observed live — and
//! projected onto the editor as per-session colored overlays: a caret for
//! the point reference, a highlight for the range reference.
//!
//! Overlay mutations run under the same suppression context as the text
//! engine, so editor surfaces whose overlay APIs emit events cannot echo
//! a remote cursor back out as a local one.
//!
//! Lifecycle per remote reference: discovery renders the overlay, `set`
//! moves it, `cleared` hides it, `disposed` removes it and its
//! bookkeeping permanently — later events for a disposed reference are
//! logged and ignored.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use uuid::Uuid;

use tether_core::buffer::TextBuffer;
use tether_core::events::Subscription;
use tether_core::overlay::OverlaySet;

use crate::document::DocHandle;
use crate::protocol::{ReferenceEvent, ReferenceKey, ReferenceValue, SessionEvent};
use crate::reference::{LocalReference, RemoteReference};
use crate::session::SessionRoster;
use crate::suppress::SuppressionContext;

type RemoteSubs = Rc<RefCell<HashMap<(Uuid, ReferenceKey), Subscription>>>;

/// Two-way presence binding for one editor surface.
pub struct PresenceBinding {
    handle: DocHandle,
    roster: Rc<SessionRoster>,
    local_cursor: LocalReference,
    local_selection: LocalReference,
    editor_subs: Vec<Subscription>,
    _lifecycle_subs: Vec<Subscription>,
}

impl PresenceBinding {
    /// Attach presence to an editor already text-bound to `handle`.
    ///
    /// Publishes the local cursor and selection references, renders the
    /// references other sessions have already published, and starts
    /// listening for new ones. `ctx` must be the same suppression context
    /// the text binding of this editor uses.
    pub fn bind(
        buffer: Rc<TextBuffer>,
        overlays: Rc<OverlaySet>,
        handle: DocHandle,
        ctx: SuppressionContext,
    ) -> Self {
        let roster = Rc::new(SessionRoster::new());
        roster.seed(&handle.connected_sessions());

        let mut lifecycle_subs = Vec::with_capacity(2);

        {
            let roster = Rc::clone(&roster);
            lifecycle_subs.push(handle.on_session(move |event| match event {
                SessionEvent::Opened { session_id, username } => {
                    roster.add(*session_id, username);
                }
                SessionEvent::Closed { session_id } => {
                    roster.remove(*session_id);
                }
            }));
        }

        let local_cursor = handle.point_reference();
        local_cursor.publish();
        let local_selection = handle.range_reference();
        local_selection.publish();

        let remote_subs: RemoteSubs = Rc::new(RefCell::new(HashMap::new()));

        {
            let buffer = Rc::clone(&buffer);
            let overlays = Rc::clone(&overlays);
            let roster = Rc::clone(&roster);
            let ctx = ctx.clone();
            let remote_subs = Rc::clone(&remote_subs);
            lifecycle_subs.push(handle.on_reference(move |remote| {
                project_reference(&buffer, &overlays, &roster, &ctx, &remote_subs, remote);
            }));
        }

        // References published before this session attached.
        for remote in handle.references() {
            project_reference(&buffer, &overlays, &roster, &ctx, &remote_subs, &remote);
        }

        let mut editor_subs = Vec::with_capacity(2);
        {
            let buffer_ref = Rc::clone(&buffer);
            let cursor_ref = local_cursor.clone();
            let cursor_ctx = ctx.clone();
            editor_subs.push(buffer.on_cursor(move |pos| {
                if cursor_ctx.is_suppressed() {
                    return;
                }
                match buffer_ref.position_to_offset(*pos) {
                    Ok(offset) => {
                        if let Err(e) = cursor_ref.set(ReferenceValue::Point(offset)) {
                            log::error!("cursor reference update rejected: {e}");
                        }
                    }
                    Err(e) => log::error!("local caret untranslatable: {e}"),
                }
            }));
        }
        {
            let buffer_ref = Rc::clone(&buffer);
            let selection_ref = local_selection.clone();
            let selection_ctx = ctx;
            editor_subs.push(buffer.on_selection(move |selection| {
                if selection_ctx.is_suppressed() {
                    return;
                }
                if selection.is_empty() {
                    if selection_ref.is_set() {
                        selection_ref.clear();
                    }
                    return;
                }
                let translated = buffer_ref.position_to_offset(selection.anchor).and_then(
                    |start| {
                        buffer_ref
                            .position_to_offset(selection.lead)
                            .map(|end| (start, end))
                    },
                );
                match translated {
                    Ok((start, end)) => {
                        let value = ReferenceValue::Range { start, end }.normalized();
                        if let Err(e) = selection_ref.set(value) {
                            log::error!("selection reference update rejected: {e}");
                        }
                    }
                    Err(e) => log::error!("local selection untranslatable: {e}"),
                }
            }));
        }

        Self {
            handle,
            roster,
            local_cursor,
            local_selection,
            editor_subs,
            _lifecycle_subs: lifecycle_subs,
        }
    }

    pub fn handle(&self) -> &DocHandle {
        &self.handle
    }

    /// Roster of connected participants, for user-list rendering.
    pub fn roster(&self) -> &SessionRoster {
        &self.roster
    }

    pub fn local_cursor(&self) -> &LocalReference {
        &self.local_cursor
    }

    pub fn local_selection(&self) -> &LocalReference {
        &self.local_selection
    }

    /// Unregister the editor cursor/selection listeners. The published
    /// local references are left alone — disposing them is session
    /// teardown's job — and remote references keep projecting.
    pub fn detach(&mut self) {
        self.editor_subs.clear();
    }
}

/// Render one remote reference as an overlay and track its event stream.
fn project_reference(
    buffer: &Rc<TextBuffer>,
    overlays: &Rc<OverlaySet>,
    roster: &Rc<SessionRoster>,
    ctx: &SuppressionContext,
    remote_subs: &RemoteSubs,
    remote: &RemoteReference,
) {
    let session_id = remote.session_id();
    let key = remote.key();

    // Enumeration and a live publish event can hand us the same reference.
    if remote_subs.borrow().contains_key(&(session_id, key)) {
        return;
    }

    let record = match roster.get(session_id) {
        Some(record) => record,
        None => {
            log::warn!(
                "reference from session {session_id} arrived before its session record; \
                 rendering with a placeholder"
            );
            roster.add(session_id, remote.username())
        }
    };

    match key {
        ReferenceKey::Cursor => overlays.add_caret(session_id, &record.username, record.color),
        ReferenceKey::Selection => {
            overlays.add_highlight(session_id, &record.username, record.color)
        }
    }

    let sub = {
        let buffer = Rc::clone(buffer);
        let overlays = Rc::clone(overlays);
        let ctx = ctx.clone();
        let remote_subs = Rc::clone(remote_subs);
        remote.on_event(move |event| match event {
            ReferenceEvent::Set(value) => {
                let _guard = ctx.enter();
                render_value(&buffer, &overlays, session_id, key, *value);
            }
            ReferenceEvent::Cleared => {
                let _guard = ctx.enter();
                let hidden = match key {
                    ReferenceKey::Cursor => overlays.clear_caret(session_id),
                    ReferenceKey::Selection => overlays.clear_highlight(session_id),
                };
                if let Err(e) = hidden {
                    log::warn!("overlay hide failed for session {session_id}: {e}");
                }
            }
            ReferenceEvent::Disposed => {
                let _guard = ctx.enter();
                match key {
                    ReferenceKey::Cursor => {
                        overlays.remove_caret(session_id);
                    }
                    ReferenceKey::Selection => {
                        overlays.remove_highlight(session_id);
                    }
                }
                remote_subs.borrow_mut().remove(&(session_id, key));
            }
            // Publication is observed via discovery, never on the stream
            // of an already-tracked reference.
            ReferenceEvent::Published => {}
        })
    };
    remote_subs.borrow_mut().insert((session_id, key), sub);

    // An enumerated reference carries its current value.
    if let Some(value) = remote.value() {
        let _guard = ctx.enter();
        render_value(buffer, overlays, session_id, key, value);
    }
}

/// Translate a reference value and move the matching overlay.
fn render_value(
    buffer: &TextBuffer,
    overlays: &OverlaySet,
    session_id: Uuid,
    key: ReferenceKey,
    value: ReferenceValue,
) {
    match (key, value.normalized()) {
        (ReferenceKey::Cursor, ReferenceValue::Point(offset)) => {
            match buffer.offset_to_position(offset) {
                Ok(pos) => {
                    if let Err(e) = overlays.set_caret(session_id, pos) {
                        log::warn!("caret overlay update failed: {e}");
                    }
                }
                Err(e) => log::error!("remote cursor at offset {offset} untranslatable: {e}"),
            }
        }
        (ReferenceKey::Selection, ReferenceValue::Range { start, end }) => {
            let translated = buffer
                .offset_to_position(start)
                .and_then(|s| buffer.offset_to_position(end).map(|e| (s, e)));
            match translated {
                Ok((start_pos, end_pos)) => {
                    if let Err(e) = overlays.set_highlight(session_id, start_pos, end_pos) {
                        log::warn!("highlight overlay update failed: {e}");
                    }
                }
                Err(e) => {
                    log::error!("remote selection {start}..{end} untranslatable: {e}")
                }
            }
        }
        (key, value) => {
            log::warn!("reference {key:?} of session {session_id} carried mismatched {value:?}")
        }
    }
}
