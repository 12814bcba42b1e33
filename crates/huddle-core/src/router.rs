//! Event routing: validation, authorization, mutation, fan-out selection.
//!
//! The router receives inbound client events, checks them against session
//! store state, applies the mutation, and decides who hears about it:
//! a unicast reply to the sender, a broadcast to the whole room, or both.
//! It also carries the room-lifecycle API consumed by the HTTP layer.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info, warn};

use huddle_protocol::{ClientEvent, RoomSummary, ServerEvent};

use crate::error::RoomError;
use crate::presence::ClientHandle;
use crate::store::{LeaveOutcome, SessionStore};

/// Length of generated room codes (collision-resistant at this size).
const ROOM_CODE_LEN: usize = 10;

/// An authenticated connection's view of itself.
///
/// Identity is attached before any room event is dispatched; the router
/// never reads identity from the event payload.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub user_name: String,
    /// The connection's own transport handle, used for unicast replies.
    pub handle: ClientHandle,
}

impl Session {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        handle: ClientHandle,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            handle,
        }
    }
}

/// Routes client events into the session store and out to room members.
pub struct EventRouter {
    store: Arc<SessionStore>,
}

impl EventRouter {
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// The store this router mutates.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Apply one inbound event.
    ///
    /// # Errors
    ///
    /// Returns a [`RoomError`] for per-request failures; the caller reports
    /// it to the offending connection as an `error` event. No error here
    /// affects other connections or other rooms.
    pub fn dispatch(&self, session: &Session, event: ClientEvent) -> Result<(), RoomError> {
        match event {
            ClientEvent::JoinRoom { room_id } => self.join_room(session, &room_id),
            ClientEvent::LeaveRoom { room_id } => {
                self.leave_room(&room_id, &session.user_id);
                Ok(())
            }
            ClientEvent::SendMessage { room_id, text } => {
                self.send_message(session, &room_id, &text)
            }
            ClientEvent::UpdateLocation { room_id, lat, lng } => {
                self.update_location(session, &room_id, lat, lng)
            }
            ClientEvent::SendMedia {
                room_id,
                url,
                kind,
                location,
            } => self.send_media(session, &room_id, url, kind, location),
            ClientEvent::DeleteMedia { room_id, media_id } => {
                self.delete_media(session, &room_id, &media_id)
            }
            ClientEvent::EndRoom { room_id } => self.end_room(session, &room_id),
        }
    }

    /// Join an existing room. Joining never creates a room.
    ///
    /// Unicasts the full snapshot to the joiner, then broadcasts the
    /// membership change (with the full user list) to the room.
    fn join_room(&self, session: &Session, room_id: &str) -> Result<(), RoomError> {
        let snapshot = self
            .store
            .add_or_update_participant(
                room_id,
                &session.user_id,
                &session.user_name,
                session.handle.clone(),
            )
            .ok_or_else(|| {
                warn!(room = %room_id, rooms = self.store.room_count(), "Join to unknown room");
                RoomError::RoomNotFound(room_id.to_string())
            })?;

        session.handle.send(ServerEvent::RoomData {
            room: snapshot.clone(),
        });
        self.store.broadcast(
            room_id,
            &ServerEvent::UserJoined {
                user_id: session.user_id.clone(),
                user_name: session.user_name.clone(),
                users: snapshot.users,
            },
        );

        info!(room = %room_id, user = %session.user_id, "Joined room");
        Ok(())
    }

    /// Remove a user from a room, deleting the room if it empties.
    ///
    /// Silent when the room does not exist (an explicit leave for a dead
    /// room is not an error). Shared by explicit leaves and guard evictions.
    /// Removal and empty-room deletion happen under one store entry guard,
    /// so a concurrent join cannot lose its room to this leave.
    pub fn leave_room(&self, room_id: &str, user_id: &str) {
        match self.store.remove_participant_and_reap(room_id, user_id) {
            None => return,
            Some(LeaveOutcome::RoomDeleted) => {
                info!(room = %room_id, "Room deleted (empty)");
            }
            Some(LeaveOutcome::Remaining(snapshot)) => {
                self.store.broadcast(
                    room_id,
                    &ServerEvent::UserLeft {
                        user_id: user_id.to_string(),
                        users: snapshot.users,
                    },
                );
            }
        }

        debug!(room = %room_id, user = %user_id, "Left room");
    }

    fn send_message(&self, session: &Session, room_id: &str, text: &str) -> Result<(), RoomError> {
        let message = self
            .store
            .append_message(room_id, &session.user_id, &session.user_name, text)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        self.store
            .broadcast(room_id, &ServerEvent::NewMessage { message });
        debug!(room = %room_id, user = %session.user_id, "Message");
        Ok(())
    }

    /// Upsert the sender's live location and broadcast the delta.
    ///
    /// Broadcasts an incremental `location-updated` event, never a snapshot.
    fn update_location(
        &self,
        session: &Session,
        room_id: &str,
        lat: f64,
        lng: f64,
    ) -> Result<(), RoomError> {
        let location = self
            .store
            .set_location(room_id, &session.user_id, &session.user_name, lat, lng)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        self.store.broadcast(
            room_id,
            &ServerEvent::location_updated(&session.user_id, &location),
        );
        Ok(())
    }

    fn send_media(
        &self,
        session: &Session,
        room_id: &str,
        url: String,
        kind: huddle_protocol::MediaKind,
        location: Option<huddle_protocol::GeoPoint>,
    ) -> Result<(), RoomError> {
        let media = self
            .store
            .append_media(
                room_id,
                &session.user_id,
                &session.user_name,
                url,
                kind,
                location,
            )
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        debug!(
            room = %room_id,
            user = %session.user_id,
            has_location = media.location.is_some(),
            "Media posted"
        );
        self.store
            .broadcast(room_id, &ServerEvent::NewMedia { media });
        Ok(())
    }

    /// Delete a media item: permitted for its author or the room admin.
    ///
    /// On `Forbidden` no mutation occurs. Broadcasts the id only.
    fn delete_media(
        &self,
        session: &Session,
        room_id: &str,
        media_id: &str,
    ) -> Result<(), RoomError> {
        let admin = self
            .store
            .admin_of(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        let media = self
            .store
            .find_media(room_id, media_id)
            .ok_or_else(|| RoomError::MediaNotFound(media_id.to_string()))?;

        let is_author = media.user_id == session.user_id;
        let is_admin = admin == session.user_id;
        if !is_author && !is_admin {
            warn!(room = %room_id, user = %session.user_id, "Media delete denied");
            return Err(RoomError::Forbidden(RoomError::MEDIA_FORBIDDEN));
        }

        if self.store.remove_media(room_id, media_id) {
            self.store.broadcast(
                room_id,
                &ServerEvent::MediaDeleted {
                    media_id: media_id.to_string(),
                },
            );
            info!(
                room = %room_id,
                media = %media_id,
                admin_override = is_admin && !is_author,
                "Media deleted"
            );
        }
        Ok(())
    }

    /// End a room: admin only. Broadcasts `room-ended` to every member,
    /// the admin included, then deletes the room. Subsequent events against
    /// this room id behave as `RoomNotFound`.
    fn end_room(&self, session: &Session, room_id: &str) -> Result<(), RoomError> {
        let admin = self
            .store
            .admin_of(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        if admin != session.user_id {
            warn!(room = %room_id, user = %session.user_id, "End-room denied");
            return Err(RoomError::Forbidden(RoomError::END_FORBIDDEN));
        }

        self.store
            .broadcast(room_id, &ServerEvent::room_ended(&session.user_name));
        self.store.delete_room(room_id);
        info!(room = %room_id, admin = %session.user_id, "Room ended by admin");
        Ok(())
    }

    // --- Room-lifecycle API for the request layer -------------------------

    /// Create a room for `admin_id` and return its code.
    ///
    /// Codes are 10-character alphanumerics; on the astronomically unlikely
    /// collision with an active room, a fresh code is drawn.
    pub fn create_room(&self, admin_id: &str) -> String {
        loop {
            let room_id = generate_room_code();
            match self.store.create_room(room_id.as_str(), admin_id) {
                Ok(_) => {
                    info!(room = %room_id, admin = %admin_id, "Room created");
                    return room_id;
                }
                Err(_) => {
                    debug!(room = %room_id, "Room code collision, redrawing");
                }
            }
        }
    }

    /// Whether a room is active.
    #[must_use]
    pub fn exists(&self, room_id: &str) -> bool {
        self.store.room_exists(room_id)
    }

    /// Lightweight room description for the request layer.
    #[must_use]
    pub fn summary(&self, room_id: &str) -> Option<RoomSummary> {
        self.store.summary(room_id)
    }

    /// End a room on behalf of an HTTP caller: admin only.
    ///
    /// Same broadcast-then-delete as the realtime `end-room` event; the
    /// notice carries the admin's joined display name when available.
    ///
    /// # Errors
    ///
    /// [`RoomError::RoomNotFound`] or [`RoomError::Forbidden`].
    pub fn end_by_admin(&self, room_id: &str, caller_id: &str) -> Result<(), RoomError> {
        let admin = self
            .store
            .admin_of(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.to_string()))?;

        if admin != caller_id {
            return Err(RoomError::Forbidden(RoomError::END_FORBIDDEN));
        }

        let admin_name = self
            .store
            .participant_name(room_id, caller_id)
            .unwrap_or_else(|| "admin".to_string());
        self.store
            .broadcast(room_id, &ServerEvent::room_ended(admin_name));
        self.store.delete_room(room_id);
        info!(room = %room_id, admin = %caller_id, "Room ended via API");
        Ok(())
    }
}

/// Draw a fresh room code.
fn generate_room_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_CODE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::ClientHandle;
    use huddle_protocol::MediaKind;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session(user: &str, name: &str, conn: &str) -> (Session, UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = ClientHandle::new(conn);
        (Session::new(user, name, handle), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn router_with_room(room_id: &str, admin: &str) -> EventRouter {
        let store = Arc::new(SessionStore::new());
        store.create_room(room_id, admin).unwrap();
        EventRouter::new(store)
    }

    #[test]
    fn test_join_unknown_room_is_not_created() {
        let router = EventRouter::new(Arc::new(SessionStore::new()));
        let (session, _rx) = session("u1", "Alice", "c1");

        let err = router.dispatch(
            &session,
            ClientEvent::JoinRoom {
                room_id: "ghost".into(),
            },
        );
        assert!(matches!(err, Err(RoomError::RoomNotFound(_))));
        assert!(!router.exists("ghost"));
    }

    #[test]
    fn test_join_unicast_snapshot_and_broadcast() {
        let router = router_with_room("r1", "ua");
        let (admin, mut admin_rx) = session("ua", "Alice", "c1");
        let (bob, mut bob_rx) = session("ub", "Bob", "c2");

        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        drain(&mut admin_rx);

        router
            .dispatch(&bob, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();

        // Bob gets the snapshot first, then the membership broadcast
        let bob_events = drain(&mut bob_rx);
        match &bob_events[0] {
            ServerEvent::RoomData { room } => {
                assert_eq!(room.users.len(), 2);
            }
            other => panic!("expected room-data, got {other:?}"),
        }
        assert!(matches!(bob_events[1], ServerEvent::UserJoined { .. }));

        // Alice only sees the membership broadcast
        let admin_events = drain(&mut admin_rx);
        match &admin_events[0] {
            ServerEvent::UserJoined { user_id, users, .. } => {
                assert_eq!(user_id, "ub");
                assert_eq!(users.len(), 2);
            }
            other => panic!("expected user-joined, got {other:?}"),
        }
    }

    #[test]
    fn test_message_broadcast_includes_sender() {
        let router = router_with_room("r1", "ua");
        let (admin, mut admin_rx) = session("ua", "Alice", "c1");
        let (bob, mut bob_rx) = session("ub", "Bob", "c2");
        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        router
            .dispatch(&bob, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        drain(&mut admin_rx);
        drain(&mut bob_rx);

        router
            .dispatch(
                &bob,
                ClientEvent::SendMessage {
                    room_id: "r1".into(),
                    text: "hi".into(),
                },
            )
            .unwrap();

        for rx in [&mut admin_rx, &mut bob_rx] {
            match &drain(rx)[0] {
                ServerEvent::NewMessage { message } => {
                    assert_eq!(message.text, "hi");
                    assert_eq!(message.user_name, "Bob");
                }
                other => panic!("expected new-message, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_leave_with_remaining_members_broadcasts() {
        let router = router_with_room("r1", "ua");
        let (admin, mut admin_rx) = session("ua", "Alice", "c1");
        let (bob, _bob_rx) = session("ub", "Bob", "c2");
        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        router
            .dispatch(&bob, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        drain(&mut admin_rx);

        router
            .dispatch(&bob, ClientEvent::LeaveRoom { room_id: "r1".into() })
            .unwrap();

        assert!(router.exists("r1"));
        match &drain(&mut admin_rx)[0] {
            ServerEvent::UserLeft { user_id, users } => {
                assert_eq!(user_id, "ub");
                assert_eq!(users.len(), 1);
            }
            other => panic!("expected user-left, got {other:?}"),
        }
    }

    #[test]
    fn test_last_leave_deletes_room() {
        let router = router_with_room("r1", "ua");
        let (admin, _rx) = session("ua", "Alice", "c1");
        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();

        router
            .dispatch(&admin, ClientEvent::LeaveRoom { room_id: "r1".into() })
            .unwrap();

        // Indistinguishable from a room that never existed
        assert!(!router.exists("r1"));
        assert!(matches!(
            router.dispatch(
                &admin,
                ClientEvent::SendMessage {
                    room_id: "r1".into(),
                    text: "hello?".into()
                }
            ),
            Err(RoomError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_media_delete_authorization() {
        let router = router_with_room("r1", "ua");
        let (admin, mut admin_rx) = session("ua", "Alice", "c1");
        let (bob, mut bob_rx) = session("ub", "Bob", "c2");
        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        router
            .dispatch(&bob, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();

        // Alice posts a photo; Bob posts a photo
        let alice_photo = router
            .store()
            .append_media("r1", "ua", "Alice", "https://blobs/a", MediaKind::Image, None)
            .unwrap();
        let bob_photo = router
            .store()
            .append_media("r1", "ub", "Bob", "https://blobs/b", MediaKind::Image, None)
            .unwrap();
        drain(&mut admin_rx);
        drain(&mut bob_rx);

        // Bob deleting Alice's photo: rejected, list unchanged
        let err = router.dispatch(
            &bob,
            ClientEvent::DeleteMedia {
                room_id: "r1".into(),
                media_id: alice_photo.id.clone(),
            },
        );
        assert!(matches!(err, Err(RoomError::Forbidden(_))));
        assert!(router.store().find_media("r1", &alice_photo.id).is_some());
        assert!(drain(&mut admin_rx).is_empty());

        // Alice deleting Bob's photo: allowed (admin override)
        router
            .dispatch(
                &admin,
                ClientEvent::DeleteMedia {
                    room_id: "r1".into(),
                    media_id: bob_photo.id.clone(),
                },
            )
            .unwrap();
        assert!(router.store().find_media("r1", &bob_photo.id).is_none());
        match &drain(&mut bob_rx)[0] {
            ServerEvent::MediaDeleted { media_id } => assert_eq!(*media_id, bob_photo.id),
            other => panic!("expected media-deleted, got {other:?}"),
        }

        // Deleting it again: MediaNotFound
        assert!(matches!(
            router.dispatch(
                &admin,
                ClientEvent::DeleteMedia {
                    room_id: "r1".into(),
                    media_id: bob_photo.id,
                }
            ),
            Err(RoomError::MediaNotFound(_))
        ));
    }

    #[test]
    fn test_end_room_admin_only() {
        let router = router_with_room("r1", "ua");
        let (admin, mut admin_rx) = session("ua", "Alice", "c1");
        let (bob, mut bob_rx) = session("ub", "Bob", "c2");
        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        router
            .dispatch(&bob, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        router
            .dispatch(
                &bob,
                ClientEvent::SendMessage {
                    room_id: "r1".into(),
                    text: "hi".into(),
                },
            )
            .unwrap();
        drain(&mut admin_rx);
        drain(&mut bob_rx);

        // Non-admin: rejected, room fully intact
        let err = router.dispatch(&bob, ClientEvent::EndRoom { room_id: "r1".into() });
        assert!(matches!(err, Err(RoomError::Forbidden(_))));
        let snapshot = router.store().snapshot("r1").unwrap();
        assert_eq!(snapshot.users.len(), 2);
        assert_eq!(snapshot.messages.len(), 1);

        // Admin: everyone (admin included) hears room-ended, then it is gone
        router
            .dispatch(&admin, ClientEvent::EndRoom { room_id: "r1".into() })
            .unwrap();
        for rx in [&mut admin_rx, &mut bob_rx] {
            match &drain(rx)[0] {
                ServerEvent::RoomEnded { admin_name, .. } => assert_eq!(admin_name, "Alice"),
                other => panic!("expected room-ended, got {other:?}"),
            }
        }
        assert!(!router.exists("r1"));
    }

    #[test]
    fn test_location_update_is_a_delta() {
        let router = router_with_room("r1", "ua");
        let (admin, mut admin_rx) = session("ua", "Alice", "c1");
        router
            .dispatch(&admin, ClientEvent::JoinRoom { room_id: "r1".into() })
            .unwrap();
        drain(&mut admin_rx);

        router
            .dispatch(
                &admin,
                ClientEvent::UpdateLocation {
                    room_id: "r1".into(),
                    lat: 48.85,
                    lng: 2.35,
                },
            )
            .unwrap();

        match &drain(&mut admin_rx)[0] {
            ServerEvent::LocationUpdated { user_id, lat, .. } => {
                assert_eq!(user_id, "ua");
                assert!((lat - 48.85).abs() < f64::EPSILON);
            }
            other => panic!("expected location-updated, got {other:?}"),
        }

        // Second update overwrites: still one entry in the room state
        router
            .dispatch(
                &admin,
                ClientEvent::UpdateLocation {
                    room_id: "r1".into(),
                    lat: 40.71,
                    lng: -74.0,
                },
            )
            .unwrap();
        assert_eq!(router.store().snapshot("r1").unwrap().locations.len(), 1);
    }

    #[test]
    fn test_lifecycle_api() {
        let router = EventRouter::new(Arc::new(SessionStore::new()));

        let room_id = router.create_room("ua");
        assert_eq!(room_id.len(), 10);
        assert!(router.exists(&room_id));
        assert_eq!(router.summary(&room_id).unwrap().admin, "ua");

        assert!(matches!(
            router.end_by_admin(&room_id, "ub"),
            Err(RoomError::Forbidden(_))
        ));
        assert!(router.exists(&room_id));

        router.end_by_admin(&room_id, "ua").unwrap();
        assert!(!router.exists(&room_id));
        assert!(matches!(
            router.end_by_admin(&room_id, "ua"),
            Err(RoomError::RoomNotFound(_))
        ));
    }
}
