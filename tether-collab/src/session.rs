//! Session bookkeeping: who is connected, under which display color.
//!
//! One record per connected session, keyed by session id — a user opening
//! two editors holds two sessions and two records. Colors are assigned
//! from the session id when the record is created and stay stable for the
//! record's lifetime, so a participant keeps their color across cursor
//! moves and selection changes.

use std::cell::RefCell;
use std::collections::HashMap;

use uuid::Uuid;

use tether_core::overlay::CursorColor;

use crate::document::SessionInfo;

/// One connected participant.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub username: String,
    pub color: CursorColor,
}

/// Roster of connected participants, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionRoster {
    records: RefCell<HashMap<Uuid, SessionRecord>>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from the connected-session enumeration at attach time.
    pub fn seed(&self, sessions: &[SessionInfo]) {
        for info in sessions {
            self.add(info.session_id, &info.username);
        }
    }

    /// Create (or refresh) the record for `session_id`.
    pub fn add(&self, session_id: Uuid, username: &str) -> SessionRecord {
        let record = SessionRecord {
            session_id,
            username: username.to_owned(),
            color: CursorColor::from_uuid(session_id),
        };
        self.records.borrow_mut().insert(session_id, record.clone());
        record
    }

    pub fn remove(&self, session_id: Uuid) -> Option<SessionRecord> {
        self.records.borrow_mut().remove(&session_id)
    }

    pub fn get(&self, session_id: Uuid) -> Option<SessionRecord> {
        self.records.borrow().get(&session_id).cloned()
    }

    pub fn contains(&self, session_id: Uuid) -> bool {
        self.records.borrow().contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Snapshot of all records, for user-list rendering.
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.borrow().values().cloned().collect()
    }
}
