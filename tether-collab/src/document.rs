//! Per-session handle onto the shared document.
//!
//! A [`DocHandle`] is a non-owning view of the room's replicated string:
//! it reads the current content, appends operations, publishes the local
//! cursor/selection references, and surfaces the inbound streams (document
//! events, reference discovery, session lifecycle). A session never
//! receives its own operations back — the change stream carries only what
//! *other* sessions did, which is exactly what the sync engines consume.
//!
//! Handles decode every inbound envelope before dispatching, so engine
//! code downstream only ever sees the closed enums of [`crate::protocol`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use tether_core::events::{Emitter, Subscription};

use crate::protocol::{
    DocEvent, MessageType, ReferenceEvent, ReferenceKey, ReferenceUpdate, ReferenceValue,
    SessionEvent, SyncMessage,
};
use crate::reference::{LocalReference, RemoteReference};
use crate::room::RoomInner;

/// A connected participant, as seen in the session enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub username: String,
}

/// Shared-document operation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    /// The operation addressed text beyond the current content.
    OutOfRange { index: usize, len: usize, content_len: usize },
    /// The session was already closed.
    SessionClosed,
    /// A point value was given to a range reference or vice versa.
    ReferenceKindMismatch { key: ReferenceKey },
}

impl fmt::Display for DocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index, len, content_len } => write!(
                f,
                "operation at index {index} (+{len}) out of range for content length {content_len}"
            ),
            Self::SessionClosed => write!(f, "session is closed"),
            Self::ReferenceKindMismatch { key } => {
                write!(f, "reference {key:?} cannot hold that value kind")
            }
        }
    }
}

impl std::error::Error for DocError {}

/// The per-session view of the shared document.
#[derive(Clone)]
pub struct DocHandle {
    inner: Rc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) room: Rc<RoomInner>,
    pub(crate) session_id: Uuid,
    pub(crate) username: String,
    closed: Cell<bool>,
    doc_events: Emitter<DocEvent>,
    reference_created: Emitter<RemoteReference>,
    session_events: Emitter<SessionEvent>,
    remote_refs: RefCell<HashMap<(Uuid, ReferenceKey), RemoteReference>>,
    local_refs: RefCell<LocalRefs>,
}

#[derive(Default)]
struct LocalRefs {
    cursor: Option<LocalRefState>,
    selection: Option<LocalRefState>,
}

#[derive(Default, Clone, Copy)]
struct LocalRefState {
    published: bool,
    value: Option<ReferenceValue>,
}

impl LocalRefs {
    fn slot(&mut self, key: ReferenceKey) -> &mut Option<LocalRefState> {
        match key {
            ReferenceKey::Cursor => &mut self.cursor,
            ReferenceKey::Selection => &mut self.selection,
        }
    }

    fn get(&self, key: ReferenceKey) -> Option<&LocalRefState> {
        match key {
            ReferenceKey::Cursor => self.cursor.as_ref(),
            ReferenceKey::Selection => self.selection.as_ref(),
        }
    }
}

pub(crate) fn placeholder_username(session_id: Uuid) -> String {
    format!("session-{}", &session_id.to_string()[..8])
}

impl SessionInner {
    pub(crate) fn new(room: Rc<RoomInner>, session_id: Uuid, username: &str) -> Self {
        Self {
            room,
            session_id,
            username: username.to_owned(),
            closed: Cell::new(false),
            doc_events: Emitter::new(),
            reference_created: Emitter::new(),
            session_events: Emitter::new(),
            remote_refs: RefCell::new(HashMap::new()),
            local_refs: RefCell::new(LocalRefs::default()),
        }
    }

    /// Inbound entry point: one encoded envelope from the room's fan-out.
    pub(crate) fn deliver(&self, bytes: &[u8]) {
        let msg = match SyncMessage::decode(bytes) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("session {}: dropping undecodable message: {e}", self.session_id);
                return;
            }
        };
        match msg.msg_type {
            MessageType::Edit => match msg.doc_event() {
                Ok(event) => self.doc_events.emit(&event),
                Err(e) => log::error!("session {}: bad edit payload: {e}", self.session_id),
            },
            MessageType::Reference => match msg.reference_update() {
                Ok(update) => self.handle_reference(msg.session_id, update),
                Err(e) => log::error!("session {}: bad reference payload: {e}", self.session_id),
            },
            MessageType::Session => match msg.session_event() {
                Ok(event) => self.session_events.emit(&event),
                Err(e) => log::error!("session {}: bad session payload: {e}", self.session_id),
            },
        }
    }

    fn handle_reference(&self, origin: Uuid, update: ReferenceUpdate) {
        match update.event {
            ReferenceEvent::Published => {
                let username = self
                    .room
                    .username_of(origin)
                    .unwrap_or_else(|| placeholder_username(origin));
                let remote = RemoteReference::new(origin, username, update.key, None);
                self.remote_refs
                    .borrow_mut()
                    .insert((origin, update.key), remote.clone());
                self.reference_created.emit(&remote);
            }
            ReferenceEvent::Set(value) => {
                let tracked = self.remote_refs.borrow().get(&(origin, update.key)).cloned();
                match tracked {
                    Some(remote) => remote.apply_set(value),
                    // Arrives after disposal (or before publish): drop it.
                    None => log::warn!(
                        "session {}: set for untracked {:?} reference of {origin}",
                        self.session_id,
                        update.key
                    ),
                }
            }
            ReferenceEvent::Cleared => {
                let tracked = self.remote_refs.borrow().get(&(origin, update.key)).cloned();
                match tracked {
                    Some(remote) => remote.apply_clear(),
                    None => log::warn!(
                        "session {}: clear for untracked {:?} reference of {origin}",
                        self.session_id,
                        update.key
                    ),
                }
            }
            ReferenceEvent::Disposed => {
                let removed = self.remote_refs.borrow_mut().remove(&(origin, update.key));
                match removed {
                    Some(remote) => remote.dispose(),
                    None => log::debug!(
                        "session {}: dispose for untracked {:?} reference of {origin}",
                        self.session_id,
                        update.key
                    ),
                }
            }
        }
    }

    fn submit(&self, event: DocEvent) -> Result<(), DocError> {
        if self.closed.get() {
            return Err(DocError::SessionClosed);
        }
        self.room.apply(self.session_id, event)
    }

    // ── Local reference state ───────────────────────────────────────

    pub(crate) fn publish_ref(&self, key: ReferenceKey) {
        if self.closed.get() {
            log::warn!("session {}: publish on closed session ignored", self.session_id);
            return;
        }
        let (already_published, value) = {
            let mut refs = self.local_refs.borrow_mut();
            let state = refs.slot(key).get_or_insert_with(LocalRefState::default);
            let already = state.published;
            state.published = true;
            (already, state.value)
        };
        if already_published {
            return;
        }
        self.room.register_reference(self.session_id, key, value);
        let seq = self.room.next_seq();
        self.room.fan_out(
            self.session_id,
            &SyncMessage::reference(
                self.session_id,
                seq,
                &ReferenceUpdate { key, event: ReferenceEvent::Published },
            ),
        );
    }

    pub(crate) fn set_ref(&self, key: ReferenceKey, value: ReferenceValue) -> Result<(), DocError> {
        match (key, value) {
            (ReferenceKey::Cursor, ReferenceValue::Point(_)) => {}
            (ReferenceKey::Selection, ReferenceValue::Range { .. }) => {}
            _ => return Err(DocError::ReferenceKindMismatch { key }),
        }
        let published = {
            let mut refs = self.local_refs.borrow_mut();
            let state = refs.slot(key).get_or_insert_with(LocalRefState::default);
            state.value = Some(value);
            state.published
        };
        if published {
            self.room.update_reference(self.session_id, key, Some(value));
            let seq = self.room.next_seq();
            self.room.fan_out(
                self.session_id,
                &SyncMessage::reference(
                    self.session_id,
                    seq,
                    &ReferenceUpdate { key, event: ReferenceEvent::Set(value) },
                ),
            );
        }
        Ok(())
    }

    pub(crate) fn clear_ref(&self, key: ReferenceKey) {
        let published = {
            let mut refs = self.local_refs.borrow_mut();
            let state = match refs.slot(key) {
                Some(state) if state.value.is_some() => state,
                _ => return,
            };
            state.value = None;
            state.published
        };
        if published {
            self.room.update_reference(self.session_id, key, None);
            let seq = self.room.next_seq();
            self.room.fan_out(
                self.session_id,
                &SyncMessage::reference(
                    self.session_id,
                    seq,
                    &ReferenceUpdate { key, event: ReferenceEvent::Cleared },
                ),
            );
        }
    }

    pub(crate) fn ref_value(&self, key: ReferenceKey) -> Option<ReferenceValue> {
        self.local_refs.borrow().get(key).and_then(|state| state.value)
    }

    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let published: Vec<ReferenceKey> = {
            let refs = self.local_refs.borrow();
            [ReferenceKey::Cursor, ReferenceKey::Selection]
                .into_iter()
                .filter(|key| refs.get(*key).map(|s| s.published).unwrap_or(false))
                .collect()
        };
        for key in published {
            self.room.remove_reference(self.session_id, key);
            let seq = self.room.next_seq();
            self.room.fan_out(
                self.session_id,
                &SyncMessage::reference(
                    self.session_id,
                    seq,
                    &ReferenceUpdate { key, event: ReferenceEvent::Disposed },
                ),
            );
        }
        self.room.remove_session(self.session_id);
        let seq = self.room.next_seq();
        self.room.fan_out(
            self.session_id,
            &SyncMessage::session(
                self.session_id,
                seq,
                &SessionEvent::Closed { session_id: self.session_id },
            ),
        );
        log::debug!("session {} ({}) closed", self.session_id, self.username);
    }
}

impl DocHandle {
    pub(crate) fn new(inner: Rc<SessionInner>) -> Self {
        Self { inner }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Current full content of the shared string.
    pub fn value(&self) -> String {
        self.inner.room.value()
    }

    /// Append an insert operation at a char offset.
    pub fn insert(&self, index: usize, text: &str) -> Result<(), DocError> {
        self.inner.submit(DocEvent::Insert { index, text: text.to_owned() })
    }

    /// Append a remove operation covering `len` chars at `index`.
    pub fn remove(&self, index: usize, len: usize) -> Result<(), DocError> {
        self.inner.submit(DocEvent::Remove { index, len })
    }

    /// Replace the whole content (out-of-band resynchronization).
    pub fn replace(&self, text: &str) -> Result<(), DocError> {
        self.inner.submit(DocEvent::Replace { text: text.to_owned() })
    }

    /// Subscribe to document events originated by other sessions.
    pub fn on_doc_event(&self, handler: impl FnMut(&DocEvent) + 'static) -> Subscription {
        self.inner.doc_events.subscribe(handler)
    }

    /// Subscribe to discovery of newly published remote references.
    pub fn on_reference(&self, handler: impl FnMut(&RemoteReference) + 'static) -> Subscription {
        self.inner.reference_created.subscribe(handler)
    }

    /// Subscribe to participant open/close events.
    pub fn on_session(&self, handler: impl FnMut(&SessionEvent) + 'static) -> Subscription {
        self.inner.session_events.subscribe(handler)
    }

    /// The local point reference ("cursor").
    pub fn point_reference(&self) -> LocalReference {
        self.local_reference(ReferenceKey::Cursor)
    }

    /// The local range reference ("selection").
    pub fn range_reference(&self) -> LocalReference {
        self.local_reference(ReferenceKey::Selection)
    }

    fn local_reference(&self, key: ReferenceKey) -> LocalReference {
        {
            let mut refs = self.inner.local_refs.borrow_mut();
            let slot = refs.slot(key);
            if slot.is_none() {
                *slot = Some(LocalRefState::default());
            }
        }
        LocalReference { session: Rc::clone(&self.inner), key }
    }

    /// The already-published references of other sessions, with their
    /// current values. Late joiners use this to render existing presence.
    pub fn references(&self) -> Vec<RemoteReference> {
        let published = self.inner.room.published_references(self.inner.session_id);
        let mut out = Vec::with_capacity(published.len());
        for (session_id, key, value) in published {
            let existing = self.inner.remote_refs.borrow().get(&(session_id, key)).cloned();
            let remote = match existing {
                Some(remote) => remote,
                None => {
                    let username = self
                        .inner
                        .room
                        .username_of(session_id)
                        .unwrap_or_else(|| placeholder_username(session_id));
                    let remote = RemoteReference::new(session_id, username, key, value);
                    self.inner
                        .remote_refs
                        .borrow_mut()
                        .insert((session_id, key), remote.clone());
                    remote
                }
            };
            out.push(remote);
        }
        out
    }

    /// All currently connected participants, including this one.
    pub fn connected_sessions(&self) -> Vec<SessionInfo> {
        self.inner.room.session_infos()
    }

    /// Leave the document: disposes this session's published references,
    /// then announces `session_closed`. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }
}
