use std::sync::Arc;

use cinebook_core::{Clock, SeatInventory, SessionStore};
use cinebook_shared::SessionRecord;
use futures_util::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

/// What a previous visit left behind for a showtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restored {
    Empty,
    /// The hold ran out while away; its seats have been released
    Expired,
    Valid(SessionRecord),
}

/// TTL-aware wrapper around a [`SessionStore`].
///
/// Records are advisory, so store failures are logged and never surface.
#[derive(Clone)]
pub struct SessionPersistence {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionPersistence {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn save(&self, showtime_id: Uuid, record: &SessionRecord) {
        if let Err(e) = self.store.save(showtime_id, record).await {
            warn!("Failed to persist session for {}: {}", showtime_id, e);
        }
    }

    pub async fn clear(&self, showtime_id: Uuid) {
        if let Err(e) = self.store.clear(showtime_id).await {
            warn!("Failed to clear session for {}: {}", showtime_id, e);
        }
    }

    /// Load the record for a showtime. Expired records are cleaned up here:
    /// their seats are released best-effort and the record is dropped.
    pub async fn restore(&self, showtime_id: Uuid, inventory: &dyn SeatInventory) -> Restored {
        let record = match self.store.load(showtime_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Restored::Empty,
            Err(e) => {
                warn!("Failed to load session for {}: {}", showtime_id, e);
                return Restored::Empty;
            }
        };

        if !record.is_expired(self.clock.now()) {
            return Restored::Valid(record);
        }

        info!("Previous hold on {} expired, releasing {} seats", showtime_id, record.selected_seats.len());
        let releases = record
            .selected_seats
            .iter()
            .map(|seat_id| inventory.release_seat(showtime_id, *seat_id));
        for (seat_id, result) in record.selected_seats.iter().zip(join_all(releases).await) {
            if let Err(e) = result {
                warn!("Failed to release stale seat {}: {}", seat_id, e);
            }
        }

        self.clear(showtime_id).await;
        Restored::Expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cinebook_core::ManualClock;
    use cinebook_shared::TicketQuantities;
    use cinebook_store::{MemoryInventory, MemorySessionStore, SeatStatusHub};
    use std::collections::BTreeMap;

    fn record(clock: &ManualClock, seats: Vec<Uuid>, ttl: Duration) -> SessionRecord {
        let now = clock.now();
        SessionRecord {
            quantities: TicketQuantities { standard: seats.len() as u32, vip: 0, couple: 0 },
            selected_seats: seats,
            food_quantities: BTreeMap::new(),
            expires_at: Some(now + ttl),
            timestamp: now,
        }
    }

    #[tokio::test]
    async fn test_valid_record_round_trips() {
        let clock = Arc::new(ManualClock::default());
        let store = MemorySessionStore::new("booking-session");
        let persistence = SessionPersistence::new(Arc::new(store), clock.clone());
        let inventory = MemoryInventory::new(Duration::minutes(6), SeatStatusHub::default(), clock.clone());
        let showtime_id = Uuid::new_v4();

        assert_eq!(persistence.restore(showtime_id, &inventory.session("alice")).await, Restored::Empty);

        let record = record(&clock, vec![Uuid::new_v4()], Duration::seconds(10));
        persistence.save(showtime_id, &record).await;
        assert_eq!(
            persistence.restore(showtime_id, &inventory.session("alice")).await,
            Restored::Valid(record)
        );
    }

    #[tokio::test]
    async fn test_expired_record_releases_and_clears() {
        let clock = Arc::new(ManualClock::default());
        let store = MemorySessionStore::new("booking-session");
        let persistence = SessionPersistence::new(Arc::new(store.clone()), clock.clone());
        let inventory = MemoryInventory::new(Duration::minutes(6), SeatStatusHub::default(), clock.clone());
        let alice = inventory.session("alice");
        let showtime_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        alice.hold_seat(showtime_id, seat_id).await.unwrap();
        persistence.save(showtime_id, &record(&clock, vec![seat_id], Duration::minutes(5))).await;

        clock.advance(Duration::minutes(5) + Duration::seconds(1));
        assert_eq!(persistence.restore(showtime_id, &alice).await, Restored::Expired);
        assert!(inventory.holder_of(showtime_id, seat_id).await.is_none());
        assert!(store.keys().await.is_empty());

        // Only reported once
        assert_eq!(persistence.restore(showtime_id, &alice).await, Restored::Empty);
    }
}
