//! # huddle-protocol
//!
//! Wire event definitions for the Huddle room engine.
//!
//! This crate defines the JSON events exchanged between Huddle clients and
//! servers over a realtime connection, the serializable room data types,
//! and the text codec.
//!
//! ## Event Types
//!
//! - `join-room` / `leave-room` - Room membership
//! - `send-message` / `send-media` / `delete-media` - Room content
//! - `update-location` - Live location deltas
//! - `end-room` - Admin-only room teardown
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, ClientEvent};
//!
//! let event = ClientEvent::SendMessage {
//!     room_id: "x7GpT2qLfA".into(),
//!     text: "hi".into(),
//! };
//!
//! // Encode and decode
//! let encoded = codec::encode_client(&event).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! ```

pub mod codec;
pub mod events;
pub mod types;

pub use codec::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{
    ChatMessage, GeoPoint, LiveLocation, MediaItem, MediaKind, ParticipantInfo, RoomSnapshot,
    RoomSummary,
};
