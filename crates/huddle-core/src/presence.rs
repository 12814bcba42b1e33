//! Presence primitives: transport handles and the live-connection registry.
//!
//! Fan-out is best-effort by construction: sends are non-blocking, and a
//! handle whose receiver is gone is simply skipped. A slow or dead consumer
//! never blocks the mutation path.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use huddle_protocol::ServerEvent;

/// The identity attached to an authenticated connection.
///
/// Credential checks happen in an external collaborator before the
/// connection reaches this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
}

impl Identity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// A participant's live transport handle.
///
/// Cloning is cheap; all clones feed the same per-connection outbound queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    conn_id: String,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ClientHandle {
    /// Create a handle and the receiving half the connection task drains.
    #[must_use]
    pub fn new(conn_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: conn_id.into(),
                tx,
            },
            rx,
        )
    }

    /// The transport connection id this handle belongs to.
    #[must_use]
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Queue an event for delivery. Returns `false` if the connection is gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Process-wide registry of live authenticated connections.
///
/// The reconnection guard consults this at eviction time: if the same user
/// identity is live on any other connection, the eviction is skipped.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conns: DashMap<String, Identity>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with its attached identity.
    pub fn attach(&self, conn_id: impl Into<String>, identity: Identity) {
        let conn_id = conn_id.into();
        debug!(connection = %conn_id, user = %identity.user_id, "Connection attached");
        self.conns.insert(conn_id, identity);
    }

    /// Deregister a connection. Idempotent.
    pub fn detach(&self, conn_id: &str) -> Option<Identity> {
        let removed = self.conns.remove(conn_id).map(|(_, identity)| identity);
        if removed.is_some() {
            debug!(connection = %conn_id, "Connection detached");
        }
        removed
    }

    /// Whether `user_id` is live on some connection.
    ///
    /// The disconnected socket must be detached before this is consulted.
    #[must_use]
    pub fn user_online(&self, user_id: &str) -> bool {
        self.conns.iter().any(|entry| entry.user_id == user_id)
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_send_and_drop() {
        let (handle, mut rx) = ClientHandle::new("c1");
        assert!(handle.send(ServerEvent::error("boom")));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::Error { .. }
        ));

        drop(rx);
        // Dead consumer: send reports failure instead of blocking
        assert!(!handle.send(ServerEvent::error("gone")));
    }

    #[test]
    fn test_registry_attach_detach() {
        let registry = ConnectionRegistry::new();
        registry.attach("c1", Identity::new("u1", "Alice"));

        assert!(registry.user_online("u1"));

        let detached = registry.detach("c1").unwrap();
        assert_eq!(detached.user_name, "Alice");
        assert!(registry.detach("c1").is_none());
        assert!(!registry.user_online("u1"));
    }

    #[test]
    fn test_user_online_across_connections() {
        let registry = ConnectionRegistry::new();
        registry.attach("c1", Identity::new("u1", "Alice"));
        registry.attach("c2", Identity::new("u1", "Alice"));

        // Old socket drops, new one stays: still online
        registry.detach("c1");
        assert!(registry.user_online("u1"));

        registry.detach("c2");
        assert!(!registry.user_online("u1"));
    }
}
