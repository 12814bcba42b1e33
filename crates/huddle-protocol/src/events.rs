//! Event types for the Huddle protocol.
//!
//! Events are the unit of communication: clients send [`ClientEvent`]s over
//! an authenticated realtime connection and receive [`ServerEvent`]s back.
//! Both are tagged JSON objects with a kebab-case `type` field.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, GeoPoint, LiveLocation, MediaItem, MediaKind, ParticipantInfo,
    RoomSnapshot, RoomId, UserId};

/// An inbound event from a client.
///
/// Authentication happens before any of these are accepted; the sender's
/// identity is attached to the connection, never carried in the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Join an existing room. Joining never creates a room.
    JoinRoom { room_id: RoomId },

    /// Leave a room explicitly.
    LeaveRoom { room_id: RoomId },

    /// Post a chat message to a room.
    SendMessage { room_id: RoomId, text: String },

    /// Report the sender's current live location.
    UpdateLocation { room_id: RoomId, lat: f64, lng: f64 },

    /// Post a media item by the URL the upload service returned.
    SendMedia {
        room_id: RoomId,
        url: String,
        kind: MediaKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<GeoPoint>,
    },

    /// Delete a media item (author or room admin only).
    DeleteMedia { room_id: RoomId, media_id: String },

    /// End the room for everyone (admin only).
    EndRoom { room_id: RoomId },
}

/// An outbound event to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full room state, unicast to the joiner only.
    RoomData { room: RoomSnapshot },

    /// Membership change: someone joined. Carries the full user list.
    UserJoined {
        user_id: UserId,
        user_name: String,
        users: Vec<ParticipantInfo>,
    },

    /// Membership change: someone left. Carries the full user list.
    UserLeft {
        user_id: UserId,
        users: Vec<ParticipantInfo>,
    },

    /// A new chat message, broadcast to the whole room including the sender.
    NewMessage {
        #[serde(flatten)]
        message: ChatMessage,
    },

    /// A new media posting.
    NewMedia {
        #[serde(flatten)]
        media: MediaItem,
    },

    /// A media item was removed. Carries the id only, not the body.
    MediaDeleted { media_id: String },

    /// Incremental live-location delta (never a full snapshot).
    LocationUpdated {
        user_id: UserId,
        user_name: String,
        lat: f64,
        lng: f64,
    },

    /// The admin ended the room; it no longer exists.
    RoomEnded { message: String, admin_name: String },

    /// A per-request failure, unicast to the offending connection.
    Error { message: String },
}

impl ServerEvent {
    /// Build a `room-ended` notice in the canonical wording.
    #[must_use]
    pub fn room_ended(admin_name: impl Into<String>) -> Self {
        Self::RoomEnded {
            message: "Room has been ended by the admin".to_string(),
            admin_name: admin_name.into(),
        }
    }

    /// Build an `error` event from any displayable error.
    #[must_use]
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    /// Build a `location-updated` delta from a stored [`LiveLocation`].
    #[must_use]
    pub fn location_updated(user_id: impl Into<UserId>, location: &LiveLocation) -> Self {
        Self::LocationUpdated {
            user_id: user_id.into(),
            user_name: location.user_name.clone(),
            lat: location.lat,
            lng: location.lng,
        }
    }
}
