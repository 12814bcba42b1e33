//! Serializable room data types.
//!
//! These are the shapes a client sees on the wire: the full room snapshot
//! delivered on join and the individual items broadcast afterwards. All
//! fields use camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user identifier, issued by the external credential service.
pub type UserId = String;

/// A room code: short, collision-resistant, globally unique among active rooms.
pub type RoomId = String;

/// A room member as seen by other members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Stable user id.
    pub id: UserId,
    /// Display name at join time.
    pub name: String,
}

/// A chat message.
///
/// Author id and display name are denormalized at write time: if the author
/// later renames themselves, past messages keep the old value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique, time-sortable id.
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// The kind of a posted media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    File,
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A media posting.
///
/// The binary content lives in external blob storage; only the URL it
/// returned is kept here. Author name is denormalized like [`ChatMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Unique, time-sortable id.
    pub id: String,
    pub user_id: UserId,
    pub user_name: String,
    /// URL returned by the upload service.
    pub url: String,
    /// Named `kind` on the wire; the event envelope already uses `type`
    /// as its tag.
    pub kind: MediaKind,
    /// Where the item was posted from, if the client shared it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// The most recent live location reported by a user.
///
/// Overwritten on every update; removed when the user leaves the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveLocation {
    pub lat: f64,
    pub lng: f64,
    pub user_name: String,
    /// Milliseconds since the Unix epoch.
    pub updated_at: u64,
}

/// Full room state, sent to a client once on join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room code.
    pub id: RoomId,
    /// The creating user; never changes for the life of the room.
    pub admin: UserId,
    pub users: Vec<ParticipantInfo>,
    pub messages: Vec<ChatMessage>,
    pub media: Vec<MediaItem>,
    pub locations: HashMap<UserId, LiveLocation>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// Lightweight room description for the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub admin: UserId,
    pub user_count: usize,
    pub message_count: usize,
    pub media_count: usize,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
        assert_eq!(serde_json::to_string(&MediaKind::File).unwrap(), "\"file\"");
    }

    #[test]
    fn test_media_item_field_names() {
        let item = MediaItem {
            id: "media_1_0".into(),
            user_id: "u1".into(),
            user_name: "Alice".into(),
            url: "https://blobs.example/abc".into(),
            kind: MediaKind::Image,
            location: None,
            timestamp: 42,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["kind"], "image");
        // Absent location is omitted, not null
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut locations = HashMap::new();
        locations.insert(
            "u1".to_string(),
            LiveLocation {
                lat: 48.85,
                lng: 2.35,
                user_name: "Alice".into(),
                updated_at: 7,
            },
        );

        let snapshot = RoomSnapshot {
            id: "x7GpT2qLfA".into(),
            admin: "u1".into(),
            users: vec![ParticipantInfo {
                id: "u1".into(),
                name: "Alice".into(),
            }],
            messages: vec![],
            media: vec![],
            locations,
            created_at: 1,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: RoomSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
