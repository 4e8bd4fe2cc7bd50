//! In-process document room: the authority behind every session handle.
//!
//! Architecture:
//! ```text
//! Session A ──┐                          ┌── Session B
//!   DocHandle │    ┌──────────────┐      │ DocHandle
//!             ├──► │ DocumentRoom │ ◄────┤
//!   insert/   │    │  Yrs Doc     │      │ insert/
//!   remove    │    │  seq stamp   │      │ remove
//!             │    │  ref registry│      │
//!             │    └──────┬───────┘      │
//!             │           │ fan-out      │
//!             └───────────┴──────────────┘
//!                  (everyone but the originator)
//! ```
//!
//! The room owns the authoritative replicated string (a Yrs text),
//! linearizes every operation with a sequence stamp, and fans the encoded
//! event out synchronously, in session join order, to every session except
//! the one that originated it. That gives each handle the contract the
//! sync engines rely on: an ordered change stream of *other* sessions'
//! operations, with offsets valid against the content at apply time.
//!
//! The CRDT merge machinery inside Yrs is consumed as-is; the room only
//! ever applies already-linearized operations to it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use uuid::Uuid;
use yrs::{Doc, GetString, OffsetKind, Options, Text, TextRef, Transact};

use tether_core::position::byte_index;

use crate::document::{DocError, DocHandle, SessionInfo, SessionInner};
use crate::protocol::{DocEvent, ReferenceKey, ReferenceValue, SessionEvent, SyncMessage};

/// The shared document authority. Clones share the same room.
#[derive(Clone)]
pub struct DocumentRoom {
    inner: Rc<RoomInner>,
}

pub(crate) struct RoomInner {
    doc: Doc,
    text: TextRef,
    seq: Cell<u64>,
    seats: RefCell<Vec<Seat>>,
    references: RefCell<Vec<PublishedRef>>,
}

struct Seat {
    session_id: Uuid,
    username: String,
    inbox: Weak<SessionInner>,
}

struct PublishedRef {
    session_id: Uuid,
    key: ReferenceKey,
    value: Option<ReferenceValue>,
}

impl Default for DocumentRoom {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRoom {
    /// A room with empty content.
    pub fn new() -> Self {
        // Byte-addressed text, to match the char→byte conversion in apply().
        let doc = Doc::with_options(Options {
            offset_kind: OffsetKind::Bytes,
            ..Options::default()
        });
        let text = doc.get_or_insert_text("content");
        Self {
            inner: Rc::new(RoomInner {
                doc,
                text,
                seq: Cell::new(0),
                seats: RefCell::new(Vec::new()),
                references: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A room seeded with `text` before any session joins.
    pub fn with_content(text: &str) -> Self {
        let room = Self::new();
        if !text.is_empty() {
            let mut txn = room.inner.doc.transact_mut();
            room.inner.text.insert(&mut txn, 0, text);
        }
        room
    }

    /// Current authoritative content.
    pub fn value(&self) -> String {
        self.inner.value()
    }

    pub fn session_count(&self) -> usize {
        self.inner.seats.borrow().len()
    }

    /// Connect a participant. Existing sessions observe `session_opened`.
    pub fn open_session(&self, username: &str) -> DocHandle {
        let session_id = Uuid::new_v4();
        let session = Rc::new(SessionInner::new(Rc::clone(&self.inner), session_id, username));
        self.inner.seats.borrow_mut().push(Seat {
            session_id,
            username: username.to_owned(),
            inbox: Rc::downgrade(&session),
        });
        let seq = self.inner.next_seq();
        self.inner.fan_out(
            session_id,
            &SyncMessage::session(
                session_id,
                seq,
                &SessionEvent::Opened { session_id, username: username.to_owned() },
            ),
        );
        log::debug!("session {session_id} ({username}) opened");
        DocHandle::new(session)
    }
}

impl RoomInner {
    pub(crate) fn value(&self) -> String {
        self.text.get_string(&self.doc.transact())
    }

    pub(crate) fn next_seq(&self) -> u64 {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);
        seq
    }

    /// Deliver `msg` to every live session except the originator, in join
    /// order. The seat list is snapshotted first so handlers may open or
    /// close sessions mid-delivery.
    pub(crate) fn fan_out(&self, origin: Uuid, msg: &SyncMessage) {
        let encoded = match msg.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("room: failed to encode {:?} message: {e}", msg.msg_type);
                return;
            }
        };
        let targets: Vec<Weak<SessionInner>> = self
            .seats
            .borrow()
            .iter()
            .filter(|seat| seat.session_id != origin)
            .map(|seat| seat.inbox.clone())
            .collect();
        for target in targets {
            if let Some(session) = target.upgrade() {
                session.deliver(&encoded);
            }
        }
    }

    /// Validate and apply one operation, then broadcast it.
    ///
    /// Offsets count chars; the Yrs text is byte-addressed, so they are
    /// converted against the pre-apply snapshot.
    pub(crate) fn apply(&self, origin: Uuid, event: DocEvent) -> Result<(), DocError> {
        let value = self.value();
        let content_len = value.chars().count();
        match &event {
            DocEvent::Insert { index, text } => {
                if *index > content_len {
                    return Err(DocError::OutOfRange {
                        index: *index,
                        len: text.chars().count(),
                        content_len,
                    });
                }
                if text.is_empty() {
                    return Ok(());
                }
                let at = byte_index(&value, *index) as u32;
                let mut txn = self.doc.transact_mut();
                self.text.insert(&mut txn, at, text);
            }
            DocEvent::Remove { index, len } => {
                let end = index.checked_add(*len);
                if end.map_or(true, |end| end > content_len) {
                    return Err(DocError::OutOfRange {
                        index: *index,
                        len: *len,
                        content_len,
                    });
                }
                if *len == 0 {
                    return Ok(());
                }
                let from = byte_index(&value, *index) as u32;
                let to = byte_index(&value, index + len) as u32;
                let mut txn = self.doc.transact_mut();
                self.text.remove_range(&mut txn, from, to - from);
            }
            DocEvent::Replace { text } => {
                let mut txn = self.doc.transact_mut();
                if !value.is_empty() {
                    self.text.remove_range(&mut txn, 0, value.len() as u32);
                }
                if !text.is_empty() {
                    self.text.insert(&mut txn, 0, text);
                }
            }
        }
        let seq = self.next_seq();
        self.fan_out(origin, &SyncMessage::edit(origin, seq, &event));
        Ok(())
    }

    // ── Session registry ────────────────────────────────────────────

    pub(crate) fn username_of(&self, session_id: Uuid) -> Option<String> {
        self.seats
            .borrow()
            .iter()
            .find(|seat| seat.session_id == session_id)
            .map(|seat| seat.username.clone())
    }

    pub(crate) fn session_infos(&self) -> Vec<SessionInfo> {
        self.seats
            .borrow()
            .iter()
            .map(|seat| SessionInfo {
                session_id: seat.session_id,
                username: seat.username.clone(),
            })
            .collect()
    }

    pub(crate) fn remove_session(&self, session_id: Uuid) {
        self.seats.borrow_mut().retain(|seat| seat.session_id != session_id);
    }

    // ── Reference registry (for join-time enumeration) ──────────────

    pub(crate) fn register_reference(
        &self,
        session_id: Uuid,
        key: ReferenceKey,
        value: Option<ReferenceValue>,
    ) {
        let mut references = self.references.borrow_mut();
        if let Some(existing) = references
            .iter_mut()
            .find(|r| r.session_id == session_id && r.key == key)
        {
            existing.value = value;
        } else {
            references.push(PublishedRef { session_id, key, value });
        }
    }

    pub(crate) fn update_reference(
        &self,
        session_id: Uuid,
        key: ReferenceKey,
        value: Option<ReferenceValue>,
    ) {
        let mut references = self.references.borrow_mut();
        match references
            .iter_mut()
            .find(|r| r.session_id == session_id && r.key == key)
        {
            Some(entry) => entry.value = value,
            None => log::debug!("room: update for unregistered {key:?} reference of {session_id}"),
        }
    }

    pub(crate) fn remove_reference(&self, session_id: Uuid, key: ReferenceKey) {
        self.references
            .borrow_mut()
            .retain(|r| !(r.session_id == session_id && r.key == key));
    }

    pub(crate) fn published_references(
        &self,
        excluding: Uuid,
    ) -> Vec<(Uuid, ReferenceKey, Option<ReferenceValue>)> {
        self.references
            .borrow()
            .iter()
            .filter(|r| r.session_id != excluding)
            .map(|r| (r.session_id, r.key, r.value))
            .collect()
    }
}
