//! Deferred eviction of disconnected participants.
//!
//! A transport can drop transiently (an app backgrounding, a large upload
//! saturating the link) without the user intending to leave. Instead of
//! removing the participant synchronously on disconnect, the guard schedules
//! an eviction after a grace window and skips it entirely if the same user
//! identity is live on any connection when the window elapses.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::presence::ConnectionRegistry;
use crate::router::EventRouter;

/// Default grace window between disconnect and eviction.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(5);

/// A pending eviction timer for one disconnected transport handle.
struct Eviction {
    user_id: String,
    timer: JoinHandle<()>,
}

/// Schedules and cancels grace-window evictions.
///
/// One timer exists per disconnected connection id; a user who reconnects
/// and disconnects again gets a fresh, independent timer for the new handle.
pub struct ReconnectionGuard {
    router: Arc<EventRouter>,
    registry: Arc<ConnectionRegistry>,
    grace: Duration,
    pending: DashMap<String, Eviction>,
}

impl ReconnectionGuard {
    #[must_use]
    pub fn new(
        router: Arc<EventRouter>,
        registry: Arc<ConnectionRegistry>,
        grace: Duration,
    ) -> Self {
        Self {
            router,
            registry,
            grace,
            pending: DashMap::new(),
        }
    }

    /// Schedule eviction of `conn_id`'s rooms after the grace window.
    ///
    /// Call after the connection has been detached from the registry. When
    /// the timer fires, the eviction is skipped if `user_id` is live on any
    /// connection; otherwise the guard performs the same removal as an
    /// explicit leave for every room where this transport is still the
    /// registered participant handle, including empty-room deletion.
    pub fn schedule(self: &Arc<Self>, conn_id: impl Into<String>, user_id: impl Into<String>) {
        let conn_id = conn_id.into();
        let user_id = user_id.into();
        debug!(connection = %conn_id, user = %user_id, "Eviction scheduled");

        let guard = Arc::clone(self);
        let task_conn = conn_id.clone();
        let task_user = user_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(guard.grace).await;
            guard.pending.remove(&task_conn);
            guard.fire(&task_conn, &task_user);
        });

        // A stale timer for the same connection id is superseded
        if let Some(old) = self.pending.insert(conn_id, Eviction { user_id, timer }) {
            old.timer.abort();
        }
    }

    fn fire(&self, conn_id: &str, user_id: &str) {
        if self.registry.user_online(user_id) {
            info!(user = %user_id, "Reconnected within grace window, eviction skipped");
            return;
        }

        let rooms = self.router.store().rooms_with_connection(conn_id);
        if rooms.is_empty() {
            debug!(connection = %conn_id, "Eviction fired with no rooms to leave");
            return;
        }

        info!(user = %user_id, rooms = rooms.len(), "Grace window elapsed, evicting");
        for room_id in rooms {
            self.router.leave_room(&room_id, user_id);
        }
    }

    /// Cancel the pending eviction for one connection. Idempotent: cancelling
    /// twice, or after the timer already fired, is a no-op.
    pub fn cancel(&self, conn_id: &str) {
        if let Some((_, eviction)) = self.pending.remove(conn_id) {
            eviction.timer.abort();
            debug!(connection = %conn_id, "Eviction cancelled");
        }
    }

    /// Cancel every pending eviction for a user identity.
    ///
    /// Called when the user presents a fresh connection; the fire-time
    /// registry check would skip these anyway, this just retires the timers
    /// early.
    pub fn cancel_user(&self, user_id: &str) {
        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect();
        for conn_id in stale {
            self.cancel(&conn_id);
        }
    }

    /// Number of evictions currently scheduled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
