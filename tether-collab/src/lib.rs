//! # tether-collab — shared-document binding for a local text editor
//!
//! Binds a locally editable text surface to a shared, multi-writer text
//! document so that concurrent edits converge and every participant sees
//! the others' live cursors and selections.
//!
//! ## Architecture
//!
//! ```text
//!            local editor surface                shared document
//! ┌────────────┐  BufferEdit  ┌──────────────┐  insert/remove  ┌──────────────┐
//! │ TextBuffer │ ───────────► │ TextBinding  │ ──────────────► │              │
//! │            │ ◄─────────── │ (suppressed) │ ◄────────────── │ DocumentRoom │
//! └────────────┘   mutate     └──────────────┘    DocEvent     │   Yrs doc    │
//! ┌────────────┐  caret/sel   ┌──────────────┐  set/clear      │   seq stamp  │
//! │ OverlaySet │ ◄─────────── │ Presence-    │ ──────────────► │   references │
//! │            │   overlays   │ Binding      │ ◄────────────── │   sessions   │
//! └────────────┘              └──────────────┘  reference evts └──────────────┘
//! ```
//!
//! Both engines of one editor share a [`SuppressionContext`]: while an
//! inbound event is being applied to the buffer or the overlays, the
//! outbound listeners see the context raised and do not echo the change
//! back to the shared document.
//!
//! ## Modules
//!
//! - [`protocol`] — closed event enums + bincode wire codec
//! - [`room`] — in-process document authority (Yrs-backed), fan-out
//! - [`document`] — per-session handle: content ops, streams, references
//! - [`reference`] — local/remote point and range references
//! - [`binding`] — text sync engine
//! - [`presence`] — reference sync engine (cursors, selections, roster)
//! - [`session`] — session records and display colors
//! - [`suppress`] — re-entrant echo-suppression context
//!
//! Everything runs single-threaded and event-driven: handlers run to
//! completion in registration order, and no engine operation suspends.
//! Bind the text engine first, then presence, so overlays are translated
//! against already-synchronized content.

pub mod binding;
pub mod document;
pub mod presence;
pub mod protocol;
pub mod reference;
pub mod room;
pub mod session;
pub mod suppress;

pub use binding::{BindingError, TextBinding};
pub use document::{DocError, DocHandle, SessionInfo};
pub use presence::PresenceBinding;
pub use protocol::{
    DocEvent, MessageType, ProtocolError, ReferenceEvent, ReferenceKey, ReferenceUpdate,
    ReferenceValue, SessionEvent, SyncMessage,
};
pub use reference::{LocalReference, RemoteReference};
pub use room::DocumentRoom;
pub use session::{SessionRecord, SessionRoster};
pub use suppress::{SuppressionContext, SuppressionGuard};
