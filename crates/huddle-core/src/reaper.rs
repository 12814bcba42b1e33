//! Periodic sweep of abandoned empty rooms.
//!
//! The immediate-deletion paths (explicit last leave, guard eviction) are
//! the primary cleanup; this sweep is the safety net bounding memory growth
//! for rooms that became empty through a path those did not cover.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::SessionStore;

/// Default sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Spawn the reaper task: fire-and-continue, no cancellation semantics.
///
/// Every `interval`, deletes all rooms with zero participants.
pub fn spawn(store: Arc<SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; the first sweep should not
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let cleaned = store.cleanup_empty_rooms();
            if cleaned > 0 {
                info!(cleaned, remaining = store.room_count(), "Reaper sweep");
            } else {
                debug!(rooms = store.room_count(), "Reaper sweep found nothing");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::ClientHandle;

    #[tokio::test(start_paused = true)]
    async fn test_empty_room_survives_at_most_one_sweep() {
        let store = Arc::new(SessionStore::new());
        store.create_room("abandoned", "ua").unwrap();

        let reaper = spawn(Arc::clone(&store), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(store.room_exists("abandoned"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!store.room_exists("abandoned"));

        reaper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_occupied_room_is_left_alone() {
        let store = Arc::new(SessionStore::new());
        store.create_room("busy", "ua").unwrap();
        let (handle, _rx) = ClientHandle::new("c1");
        store.add_or_update_participant("busy", "ua", "Alice", handle);

        let reaper = spawn(Arc::clone(&store), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(store.room_exists("busy"));

        reaper.abort();
    }
}
