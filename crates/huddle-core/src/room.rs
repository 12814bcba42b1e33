//! Room data model.
//!
//! A [`Room`] owns everything reachable from it: participants with their
//! live transport handles, message and media history, and per-user live
//! locations. The [`SessionStore`](crate::store::SessionStore) is the only
//! long-lived owner of `Room` values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use huddle_protocol::{
    ChatMessage, GeoPoint, LiveLocation, MediaItem, MediaKind, ParticipantInfo, RoomSnapshot,
    RoomSummary,
};

use crate::presence::ClientHandle;

/// Atomic counter for ensuring unique ids even within the same millisecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generate a unique, time-sortable item id such as `msg_1700000000000_2a`.
#[must_use]
pub fn generate_item_id(prefix: &str) -> String {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{:x}", prefix, now_millis(), counter)
}

/// A user currently joined to a room.
///
/// A user id appears at most once per room; a rejoin replaces the transport
/// handle in place rather than adding a second entry.
#[derive(Debug)]
pub struct Participant {
    /// Stable user id.
    pub id: String,
    /// Display name captured at join time.
    pub name: String,
    /// Live transport handle, replaced on reconnect.
    pub handle: ClientHandle,
}

/// An ephemeral, code-addressed collaboration session.
#[derive(Debug)]
pub struct Room {
    /// Room code.
    pub id: String,
    /// The creating user. Never changes.
    pub admin: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub participants: Vec<Participant>,
    pub messages: Vec<ChatMessage>,
    pub media: Vec<MediaItem>,
    /// At most one entry per user id.
    pub locations: HashMap<String, LiveLocation>,
}

impl Room {
    /// Create an empty room owned by `admin`.
    #[must_use]
    pub fn new(id: impl Into<String>, admin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: admin.into(),
            created_at: now_millis(),
            participants: Vec::new(),
            messages: Vec::new(),
            media: Vec::new(),
            locations: HashMap::new(),
        }
    }

    /// Add a participant, or replace the transport handle of an existing one.
    ///
    /// Returns `true` if this is a new member, `false` on a reconnect.
    /// Message and media history are untouched either way.
    pub fn upsert_participant(
        &mut self,
        user_id: impl Into<String>,
        name: impl Into<String>,
        handle: ClientHandle,
    ) -> bool {
        let user_id = user_id.into();
        if let Some(existing) = self.participants.iter_mut().find(|p| p.id == user_id) {
            existing.handle = handle;
            false
        } else {
            self.participants.push(Participant {
                id: user_id,
                name: name.into(),
                handle,
            });
            true
        }
    }

    /// Remove a participant and their live-location entry.
    ///
    /// Returns `true` if the user was present. Does not decide whether the
    /// now-possibly-empty room should be deleted.
    pub fn remove_participant(&mut self, user_id: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != user_id);
        self.locations.remove(user_id);
        self.participants.len() < before
    }

    /// Append a chat message, denormalizing the author's name at write time.
    pub fn append_message(
        &mut self,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        text: impl Into<String>,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: generate_item_id("msg"),
            user_id: user_id.into(),
            user_name: user_name.into(),
            text: text.into(),
            timestamp: now_millis(),
        };
        self.messages.push(message.clone());
        message
    }

    /// Append a media item, denormalizing the author's name at write time.
    pub fn append_media(
        &mut self,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        url: impl Into<String>,
        kind: MediaKind,
        location: Option<GeoPoint>,
    ) -> MediaItem {
        let media = MediaItem {
            id: generate_item_id("media"),
            user_id: user_id.into(),
            user_name: user_name.into(),
            url: url.into(),
            kind,
            location,
            timestamp: now_millis(),
        };
        self.media.push(media.clone());
        media
    }

    /// Find a media item by id.
    #[must_use]
    pub fn find_media(&self, media_id: &str) -> Option<&MediaItem> {
        self.media.iter().find(|m| m.id == media_id)
    }

    /// Remove a media item by id. Returns `true` if it existed.
    pub fn remove_media(&mut self, media_id: &str) -> bool {
        let before = self.media.len();
        self.media.retain(|m| m.id != media_id);
        self.media.len() < before
    }

    /// Overwrite the user's live location.
    pub fn set_location(
        &mut self,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        lat: f64,
        lng: f64,
    ) -> LiveLocation {
        let location = LiveLocation {
            lat,
            lng,
            user_name: user_name.into(),
            updated_at: now_millis(),
        };
        self.locations.insert(user_id.into(), location.clone());
        location
    }

    /// Whether the room has no participants (and is eligible for deletion).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether `conn_id` is the registered transport handle of a participant.
    #[must_use]
    pub fn has_connection(&self, conn_id: &str) -> bool {
        self.participants.iter().any(|p| p.handle.conn_id() == conn_id)
    }

    /// Display name of a participant, if present.
    #[must_use]
    pub fn participant_name(&self, user_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.id == user_id)
            .map(|p| p.name.as_str())
    }

    /// The serializable member list.
    #[must_use]
    pub fn participant_infos(&self) -> Vec<ParticipantInfo> {
        self.participants
            .iter()
            .map(|p| ParticipantInfo {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }

    /// Full serializable state, sent to a client on join.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            admin: self.admin.clone(),
            users: self.participant_infos(),
            messages: self.messages.clone(),
            media: self.media.clone(),
            locations: self.locations.clone(),
            created_at: self.created_at,
        }
    }

    /// Lightweight description for the request layer.
    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id.clone(),
            admin: self.admin.clone(),
            user_count: self.participants.len(),
            message_count: self.messages.len(),
            media_count: self.media.len(),
            created_at: self.created_at,
        }
    }
}
