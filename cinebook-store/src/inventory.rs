use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use cinebook_catalog::{InventoryBoard, InventoryError};
use cinebook_core::{Clock, CoreError, CoreResult, SeatInventory};
use cinebook_shared::{SeatId, SeatStatusEvent};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{RedisSeatChannel, SeatStatusHub};
use crate::redis_repo::{HoldOutcome, RedisClient};

/// A seat held by someone else, booked, or a hold that lapsed before commit
/// all mean another session won the seat.
pub(crate) fn board_error(err: InventoryError) -> CoreError {
    match &err {
        InventoryError::AlreadyHeld(_) | InventoryError::AlreadyBooked(_) | InventoryError::NotHeld(_) => {
            CoreError::ConflictError(err.to_string())
        }
    }
}

fn redis_error(err: redis::RedisError) -> CoreError {
    CoreError::TransientError(err.to_string())
}

/// Process-local seat inventory shared between sessions.
///
/// Every successful transition is published on the hub, the way a real
/// backend would push it to every client watching the showtime.
#[derive(Clone)]
pub struct MemoryInventory {
    board: Arc<RwLock<InventoryBoard>>,
    hub: SeatStatusHub,
    clock: Arc<dyn Clock>,
}

impl MemoryInventory {
    pub fn new(hold_ttl: Duration, hub: SeatStatusHub, clock: Arc<dyn Clock>) -> Self {
        Self {
            board: Arc::new(RwLock::new(InventoryBoard::new(hold_ttl))),
            hub,
            clock,
        }
    }

    /// Handle acting on behalf of one session
    pub fn session(&self, holder: impl Into<String>) -> MemorySeatInventory {
        MemorySeatInventory {
            inventory: self.clone(),
            holder: holder.into(),
        }
    }

    pub fn hub(&self) -> &SeatStatusHub {
        &self.hub
    }

    pub async fn holder_of(&self, showtime_id: Uuid, seat_id: SeatId) -> Option<String> {
        let board = self.board.read().await;
        board
            .holder_of(showtime_id, &seat_id, self.clock.now())
            .map(str::to_string)
    }

    /// Commit the holder's seats and announce them as booked
    pub async fn commit(&self, showtime_id: Uuid, seat_ids: &[SeatId], holder: &str) -> CoreResult<()> {
        {
            let mut board = self.board.write().await;
            board
                .commit(showtime_id, seat_ids, holder, self.clock.now())
                .map_err(board_error)?;
        }
        for seat_id in seat_ids {
            self.hub.publish(SeatStatusEvent::booked(showtime_id, *seat_id));
        }
        info!("Committed {} seats on {} for {}", seat_ids.len(), showtime_id, holder);
        Ok(())
    }

    /// Server-side TTL sweep. Freed seats are announced as released.
    pub async fn purge_expired(&self) -> usize {
        let freed = {
            let mut board = self.board.write().await;
            board.purge_expired(self.clock.now())
        };
        for (showtime_id, seat_id) in &freed {
            self.hub.publish(SeatStatusEvent::released(*showtime_id, *seat_id));
        }
        freed.len()
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until the handle is aborted
    pub fn spawn_sweeper(&self, period: std::time::Duration) -> JoinHandle<()> {
        let inventory = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let freed = inventory.purge_expired().await;
                if freed > 0 {
                    debug!("Swept {} expired seat holds", freed);
                }
            }
        })
    }
}

/// Session-scoped view of a [`MemoryInventory`]
#[derive(Clone)]
pub struct MemorySeatInventory {
    inventory: MemoryInventory,
    holder: String,
}

impl MemorySeatInventory {
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

#[async_trait]
impl SeatInventory for MemorySeatInventory {
    async fn hold_seat(&self, showtime_id: Uuid, seat_id: SeatId) -> CoreResult<()> {
        {
            let mut board = self.inventory.board.write().await;
            board
                .hold(showtime_id, seat_id, &self.holder, self.inventory.clock.now())
                .map_err(board_error)?;
        }
        self.inventory.hub.publish(SeatStatusEvent::held(showtime_id, seat_id));
        Ok(())
    }

    async fn release_seat(&self, showtime_id: Uuid, seat_id: SeatId) -> CoreResult<()> {
        let released = {
            let mut board = self.inventory.board.write().await;
            board.release(showtime_id, seat_id, &self.holder)
        };
        if released {
            self.inventory.hub.publish(SeatStatusEvent::released(showtime_id, seat_id));
        }
        Ok(())
    }

    async fn list_held_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatId>> {
        let board = self.inventory.board.read().await;
        Ok(board.held(showtime_id, self.inventory.clock.now()))
    }

    async fn list_booked_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatId>> {
        let board = self.inventory.board.read().await;
        Ok(board.booked(showtime_id))
    }
}

/// Seat inventory backed by Redis locks, scoped to one holder
#[derive(Clone)]
pub struct RedisSeatInventory {
    redis: RedisClient,
    channel: RedisSeatChannel,
    holder: String,
    lock_ttl_seconds: u64,
    clock: Arc<dyn Clock>,
}

impl RedisSeatInventory {
    pub fn new(redis: RedisClient, holder: impl Into<String>, lock_ttl_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            channel: RedisSeatChannel::new(redis.clone()),
            redis,
            holder: holder.into(),
            lock_ttl_seconds,
            clock,
        }
    }

    async fn announce(&self, event: SeatStatusEvent) {
        if let Err(e) = self.channel.publish(&event).await {
            warn!("Failed to publish seat event for {}: {}", event.seat_id, e);
        }
    }
}

fn parse_seat_ids(raw: Vec<String>) -> Vec<SeatId> {
    raw.iter()
        .filter_map(|id| match Uuid::parse_str(id) {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring malformed seat id {}", id);
                None
            }
        })
        .collect()
}

#[async_trait]
impl SeatInventory for RedisSeatInventory {
    async fn hold_seat(&self, showtime_id: Uuid, seat_id: SeatId) -> CoreResult<()> {
        let expires_at = self.clock.now().timestamp() + self.lock_ttl_seconds as i64;

        let outcome = self
            .redis
            .acquire_seat_lock(
                &showtime_id.to_string(),
                &seat_id.to_string(),
                &self.holder,
                self.lock_ttl_seconds,
                expires_at,
            )
            .await
            .map_err(redis_error)?;

        match outcome {
            HoldOutcome::Acquired => {
                self.announce(SeatStatusEvent::held(showtime_id, seat_id)).await;
                Ok(())
            }
            HoldOutcome::HeldByOther => Err(CoreError::ConflictError(format!("Seat already held: {}", seat_id))),
            HoldOutcome::Booked => Err(CoreError::ConflictError(format!("Seat already booked: {}", seat_id))),
        }
    }

    async fn release_seat(&self, showtime_id: Uuid, seat_id: SeatId) -> CoreResult<()> {
        let released = self
            .redis
            .release_seat_lock(&showtime_id.to_string(), &seat_id.to_string(), &self.holder)
            .await
            .map_err(redis_error)?;

        if released {
            self.announce(SeatStatusEvent::released(showtime_id, seat_id)).await;
        }
        Ok(())
    }

    async fn list_held_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatId>> {
        let raw = self
            .redis
            .held_seats(&showtime_id.to_string(), self.clock.now().timestamp())
            .await
            .map_err(redis_error)?;
        Ok(parse_seat_ids(raw))
    }

    async fn list_booked_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatId>> {
        let raw = self
            .redis
            .booked_seats(&showtime_id.to_string())
            .await
            .map_err(redis_error)?;
        Ok(parse_seat_ids(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinebook_core::{ManualClock, SeatStatusChannel};
    use cinebook_shared::SeatStatus;
    use futures_util::StreamExt;

    fn inventory(clock: Arc<ManualClock>) -> MemoryInventory {
        MemoryInventory::new(Duration::minutes(6), SeatStatusHub::default(), clock)
    }

    #[tokio::test]
    async fn test_sessions_compete_for_a_seat() {
        let clock = Arc::new(ManualClock::default());
        let inventory = inventory(clock.clone());
        let alice = inventory.session("alice");
        let bob = inventory.session("bob");
        let showtime_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        alice.hold_seat(showtime_id, seat_id).await.unwrap();
        let err = bob.hold_seat(showtime_id, seat_id).await.unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(bob.list_held_seats(showtime_id).await.unwrap(), vec![seat_id]);

        // Bob cannot release Alice's hold
        bob.release_seat(showtime_id, seat_id).await.unwrap();
        assert_eq!(inventory.holder_of(showtime_id, seat_id).await.as_deref(), Some("alice"));

        alice.release_seat(showtime_id, seat_id).await.unwrap();
        alice.release_seat(showtime_id, seat_id).await.unwrap();
        bob.hold_seat(showtime_id, seat_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let clock = Arc::new(ManualClock::default());
        let inventory = inventory(clock.clone());
        let alice = inventory.session("alice");
        let showtime_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        let mut events = inventory.hub().join(showtime_id).await.unwrap();

        alice.hold_seat(showtime_id, seat_id).await.unwrap();
        inventory.commit(showtime_id, &[seat_id], "alice").await.unwrap();

        assert_eq!(events.next().await.unwrap().status, SeatStatus::Held);
        assert_eq!(events.next().await.unwrap().status, SeatStatus::Booked);
        assert_eq!(alice.list_booked_seats(showtime_id).await.unwrap(), vec![seat_id]);
    }

    #[tokio::test]
    async fn test_purge_announces_release() {
        let clock = Arc::new(ManualClock::default());
        let inventory = inventory(clock.clone());
        let alice = inventory.session("alice");
        let showtime_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        let mut events = inventory.hub().join(showtime_id).await.unwrap();
        alice.hold_seat(showtime_id, seat_id).await.unwrap();
        events.next().await.unwrap();

        clock.advance(Duration::minutes(7));
        assert_eq!(inventory.purge_expired().await, 1);
        assert_eq!(events.next().await.unwrap().status, SeatStatus::Released);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_frees_lapsed_holds() {
        let clock = Arc::new(ManualClock::default());
        let inventory = inventory(clock.clone());
        let alice = inventory.session("alice");
        let showtime_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        alice.hold_seat(showtime_id, seat_id).await.unwrap();
        let mut events = inventory.hub().join(showtime_id).await.unwrap();
        let sweeper = inventory.spawn_sweeper(std::time::Duration::from_secs(1));

        clock.advance(Duration::minutes(7));
        let event = events.next().await.unwrap();
        assert_eq!(event.status, SeatStatus::Released);
        assert_eq!(event.seat_id, seat_id);
        assert!(alice.list_held_seats(showtime_id).await.unwrap().is_empty());

        sweeper.abort();
    }
}
