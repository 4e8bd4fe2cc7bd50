//! Point and range references — ephemeral per-session annotations on the
//! shared string, used for cursor and selection presence.
//!
//! A session publishes at most one point reference ("cursor") and one
//! range reference ("selection"). [`LocalReference`] is the publishing
//! side; [`RemoteReference`] is the tracked projection of another
//! session's reference, with its own `set`/`cleared`/`disposed` event
//! stream. Disposal is terminal: once a remote reference is disposed no
//! further events are delivered for it.

use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

use tether_core::events::{Emitter, Subscription};

use crate::document::{DocError, SessionInner};
use crate::protocol::{ReferenceEvent, ReferenceKey, ReferenceValue};

/// Publishing handle for one of the local session's references.
///
/// Handles are cheap to clone and share state through the session: two
/// `point_reference()` calls on the same session yield the same
/// underlying reference.
#[derive(Clone)]
pub struct LocalReference {
    pub(crate) session: Rc<SessionInner>,
    pub(crate) key: ReferenceKey,
}

impl LocalReference {
    pub fn key(&self) -> ReferenceKey {
        self.key
    }

    pub fn session_id(&self) -> Uuid {
        self.session.session_id
    }

    pub fn username(&self) -> String {
        self.session.username.clone()
    }

    pub fn is_local(&self) -> bool {
        true
    }

    /// Announce the reference to the other sessions. Until published, the
    /// reference is invisible remotely and `set`/`clear` stay local.
    pub fn publish(&self) {
        self.session.publish_ref(self.key);
    }

    /// Give the reference a new value. The value kind must match the key:
    /// a cursor carries a point, a selection carries a range.
    pub fn set(&self, value: ReferenceValue) -> Result<(), DocError> {
        self.session.set_ref(self.key, value)
    }

    /// Unset the reference without destroying it. No-op when not set.
    pub fn clear(&self) {
        self.session.clear_ref(self.key);
    }

    pub fn is_set(&self) -> bool {
        self.value().is_some()
    }

    pub fn value(&self) -> Option<ReferenceValue> {
        self.session.ref_value(self.key)
    }
}

/// A remote session's reference as tracked locally.
#[derive(Clone)]
pub struct RemoteReference {
    inner: Rc<RemoteRefInner>,
}

pub(crate) struct RemoteRefInner {
    session_id: Uuid,
    username: String,
    key: ReferenceKey,
    value: Cell<Option<ReferenceValue>>,
    disposed: Cell<bool>,
    events: Emitter<ReferenceEvent>,
}

impl RemoteReference {
    pub(crate) fn new(
        session_id: Uuid,
        username: String,
        key: ReferenceKey,
        value: Option<ReferenceValue>,
    ) -> Self {
        Self {
            inner: Rc::new(RemoteRefInner {
                session_id,
                username,
                key,
                value: Cell::new(value),
                disposed: Cell::new(false),
                events: Emitter::new(),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    pub fn key(&self) -> ReferenceKey {
        self.inner.key
    }

    pub fn is_local(&self) -> bool {
        false
    }

    pub fn value(&self) -> Option<ReferenceValue> {
        self.inner.value.get()
    }

    pub fn is_set(&self) -> bool {
        self.inner.value.get().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Subscribe to this reference's `set`/`cleared`/`disposed` stream.
    pub fn on_event(&self, handler: impl FnMut(&ReferenceEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(handler)
    }

    pub(crate) fn apply_set(&self, value: ReferenceValue) {
        self.inner.value.set(Some(value));
        self.inner.events.emit(&ReferenceEvent::Set(value));
    }

    pub(crate) fn apply_clear(&self) {
        self.inner.value.set(None);
        self.inner.events.emit(&ReferenceEvent::Cleared);
    }

    pub(crate) fn dispose(&self) {
        self.inner.disposed.set(true);
        self.inner.value.set(None);
        self.inner.events.emit(&ReferenceEvent::Disposed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_remote_reference_event_stream() {
        let remote = RemoteReference::new(
            Uuid::new_v4(),
            "alice".into(),
            ReferenceKey::Cursor,
            None,
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = remote.on_event(move |event| sink.borrow_mut().push(event.clone()));

        remote.apply_set(ReferenceValue::Point(4));
        assert!(remote.is_set());

        remote.apply_clear();
        assert!(!remote.is_set());

        remote.dispose();
        assert!(remote.is_disposed());

        assert_eq!(
            *seen.borrow(),
            vec![
                ReferenceEvent::Set(ReferenceValue::Point(4)),
                ReferenceEvent::Cleared,
                ReferenceEvent::Disposed,
            ]
        );
    }

    #[test]
    fn test_remote_reference_starts_with_enumerated_value() {
        let remote = RemoteReference::new(
            Uuid::new_v4(),
            "bob".into(),
            ReferenceKey::Selection,
            Some(ReferenceValue::Range { start: 1, end: 5 }),
        );
        assert!(remote.is_set());
        assert!(!remote.is_local());
        assert_eq!(remote.value(), Some(ReferenceValue::Range { start: 1, end: 5 }));
    }
}
