//! The authoritative in-memory session store.
//!
//! Rooms are indexed by code in a [`DashMap`]; every operation against a
//! given room runs under that room's map-entry guard, so operations on the
//! same room are mutually exclusive while distinct rooms never block each
//! other. There is no global lock and no I/O at this layer.

use dashmap::DashMap;
use tracing::debug;

use huddle_protocol::{
    ChatMessage, GeoPoint, LiveLocation, MediaItem, MediaKind, RoomSnapshot, RoomSummary,
    ServerEvent,
};

use crate::error::RoomError;
use crate::presence::ClientHandle;
use crate::room::Room;

/// What a room looked like after a leave, observed under the entry guard.
#[derive(Debug)]
pub enum LeaveOutcome {
    /// The last participant left; the room was deleted under the same guard.
    RoomDeleted,
    /// Other participants remain. Snapshot taken after the removal.
    Remaining(RoomSnapshot),
}

/// Owns every active [`Room`] and everything reachable from them.
///
/// All state is ephemeral: a process restart loses everything, by design.
#[derive(Debug, Default)]
pub struct SessionStore {
    rooms: DashMap<String, Room>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room owned by `admin_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::AlreadyExists`] if the code is already active.
    pub fn create_room(&self, room_id: &str, admin_id: &str) -> Result<RoomSnapshot, RoomError> {
        match self.rooms.entry(room_id.to_string()) {
            dashmap::Entry::Occupied(_) => Err(RoomError::AlreadyExists(room_id.to_string())),
            dashmap::Entry::Vacant(entry) => {
                let room = Room::new(room_id, admin_id);
                let snapshot = room.snapshot();
                entry.insert(room);
                debug!(room = %room_id, admin = %snapshot.admin, "Room created");
                Ok(snapshot)
            }
        }
    }

    /// Whether a room is active.
    #[must_use]
    pub fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Full state of a room, if it exists.
    #[must_use]
    pub fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(|room| room.snapshot())
    }

    /// Delete a room and everything it owns. Returns `true` iff it existed.
    pub fn delete_room(&self, room_id: &str) -> bool {
        let deleted = self.rooms.remove(room_id).is_some();
        if deleted {
            debug!(room = %room_id, "Room deleted");
        }
        deleted
    }

    /// Add a participant, or replace an existing participant's transport
    /// handle (the reconnect path). History is untouched either way.
    ///
    /// Returns the updated snapshot, or `None` if the room does not exist.
    pub fn add_or_update_participant(
        &self,
        room_id: &str,
        user_id: &str,
        name: &str,
        handle: ClientHandle,
    ) -> Option<RoomSnapshot> {
        let mut room = self.rooms.get_mut(room_id)?;
        room.upsert_participant(user_id, name, handle);
        Some(room.snapshot())
    }

    /// Remove a participant and their live location.
    ///
    /// Never deletes the room itself, even if it is now empty; that decision
    /// belongs to the event router and the reaper.
    ///
    /// Returns the updated snapshot, or `None` if the room does not exist.
    pub fn remove_participant(&self, room_id: &str, user_id: &str) -> Option<RoomSnapshot> {
        let mut room = self.rooms.get_mut(room_id)?;
        room.remove_participant(user_id);
        Some(room.snapshot())
    }

    /// Remove a participant and, if the room is now empty, delete it — all
    /// under one entry guard. A join cannot land between the removal and the
    /// deletion; the emptiness check sees any concurrent membership change.
    ///
    /// Returns `None` if the room does not exist.
    pub fn remove_participant_and_reap(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Option<LeaveOutcome> {
        match self.rooms.entry(room_id.to_string()) {
            dashmap::Entry::Occupied(mut entry) => {
                entry.get_mut().remove_participant(user_id);
                if entry.get().is_empty() {
                    entry.remove();
                    debug!(room = %room_id, "Room deleted (empty)");
                    Some(LeaveOutcome::RoomDeleted)
                } else {
                    Some(LeaveOutcome::Remaining(entry.get().snapshot()))
                }
            }
            dashmap::Entry::Vacant(_) => None,
        }
    }

    /// Append a chat message. Returns `None` if the room does not exist.
    pub fn append_message(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
        text: impl Into<String>,
    ) -> Option<ChatMessage> {
        let mut room = self.rooms.get_mut(room_id)?;
        Some(room.append_message(user_id, user_name, text))
    }

    /// Append a media item. Returns `None` if the room does not exist.
    pub fn append_media(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
        url: impl Into<String>,
        kind: MediaKind,
        location: Option<GeoPoint>,
    ) -> Option<MediaItem> {
        let mut room = self.rooms.get_mut(room_id)?;
        Some(room.append_media(user_id, user_name, url, kind, location))
    }

    /// Look up a media item by id.
    #[must_use]
    pub fn find_media(&self, room_id: &str, media_id: &str) -> Option<MediaItem> {
        self.rooms
            .get(room_id)?
            .find_media(media_id)
            .cloned()
    }

    /// Remove a media item. Returns `true` iff it existed.
    pub fn remove_media(&self, room_id: &str, media_id: &str) -> bool {
        self.rooms
            .get_mut(room_id)
            .map(|mut room| room.remove_media(media_id))
            .unwrap_or(false)
    }

    /// Overwrite a user's live location.
    ///
    /// Returns the stored entry, or `None` if the room does not exist.
    pub fn set_location(
        &self,
        room_id: &str,
        user_id: &str,
        user_name: &str,
        lat: f64,
        lng: f64,
    ) -> Option<LiveLocation> {
        let mut room = self.rooms.get_mut(room_id)?;
        Some(room.set_location(user_id, user_name, lat, lng))
    }

    /// The admin identity of a room.
    #[must_use]
    pub fn admin_of(&self, room_id: &str) -> Option<String> {
        self.rooms.get(room_id).map(|room| room.admin.clone())
    }

    /// Display name of a participant in a room, if joined.
    #[must_use]
    pub fn participant_name(&self, room_id: &str, user_id: &str) -> Option<String> {
        self.rooms
            .get(room_id)?
            .participant_name(user_id)
            .map(str::to_string)
    }

    /// Lightweight description of a room for the request layer.
    #[must_use]
    pub fn summary(&self, room_id: &str) -> Option<RoomSummary> {
        self.rooms.get(room_id).map(|room| room.summary())
    }

    /// Summaries of all active rooms (debug/introspection only).
    #[must_use]
    pub fn list_summaries(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(|room| room.summary()).collect()
    }

    /// Number of active rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Rooms where `conn_id` is the registered transport of a participant.
    #[must_use]
    pub fn rooms_with_connection(&self, conn_id: &str) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|room| room.has_connection(conn_id))
            .map(|room| room.id.clone())
            .collect()
    }

    /// Delete every room with zero participants (the reaper's sweep).
    ///
    /// Returns the number of rooms removed.
    pub fn cleanup_empty_rooms(&self) -> usize {
        let empty: Vec<String> = self
            .rooms
            .iter()
            .filter(|room| room.is_empty())
            .map(|room| room.id.clone())
            .collect();

        let mut cleaned = 0;
        for room_id in empty {
            // Re-check under the entry guard: someone may have joined since
            if self
                .rooms
                .remove_if(&room_id, |_, room| room.is_empty())
                .is_some()
            {
                debug!(room = %room_id, "Reaped empty room");
                cleaned += 1;
            }
        }
        cleaned
    }

    /// Fan an event out to every participant of a room, best-effort.
    ///
    /// Returns the number of participants whose queue accepted the event.
    /// A participant whose connection is gone is skipped; the reconnection
    /// guard owns their eventual removal.
    pub fn broadcast(&self, room_id: &str, event: &ServerEvent) -> usize {
        let Some(room) = self.rooms.get(room_id) else {
            return 0;
        };
        room.participants
            .iter()
            .filter(|p| p.handle.send(event.clone()))
            .count()
    }
}
