//! # tether-core — editor-side collaborator for the tether binding
//!
//! The pieces of a collaborative editing session that live on the editor
//! side of the boundary:
//!
//! - [`position`] — pure char-offset ↔ (line, column) translation
//! - [`buffer`] — headless text buffer with change/cursor/selection streams
//! - [`overlay`] — per-session colored caret and highlight overlays
//! - [`events`] — the synchronous listener registry behind every stream
//!
//! Everything here is single-threaded and event-driven: handlers run to
//! completion on the caller's thread, in registration order. The crate
//! deliberately has no knowledge of the shared document — `tether-collab`
//! bridges the two.

pub mod buffer;
pub mod events;
pub mod overlay;
pub mod position;

pub use buffer::{BufferEdit, EditAction, Selection, TextBuffer};
pub use events::{Emitter, Subscription};
pub use overlay::{CursorColor, OverlayError, OverlaySet, RemoteCaret, RemoteHighlight};
pub use position::{byte_index, offset_to_position, position_to_offset, Position, PositionError};
