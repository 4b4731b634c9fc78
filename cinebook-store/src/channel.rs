use async_trait::async_trait;
use cinebook_core::{CoreError, CoreResult, SeatEventStream, SeatStatusChannel};
use cinebook_shared::SeatStatusEvent;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::redis_repo::{seat_channel_name, RedisClient};

/// In-process fan-out of seat events; `join` filters by showtime
#[derive(Clone)]
pub struct SeatStatusHub {
    tx: broadcast::Sender<SeatStatusEvent>,
}

impl SeatStatusHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers saw the event
    pub fn publish(&self, event: SeatStatusEvent) -> usize {
        debug!("Seat {} on {} -> {:?}", event.seat_id, event.showtime_id, event.status);
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SeatStatusHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl SeatStatusChannel for SeatStatusHub {
    async fn join(&self, showtime_id: Uuid) -> CoreResult<SeatEventStream> {
        let rx = self.tx.subscribe();

        let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
            match result {
                Ok(event) if event.showtime_id == showtime_id => Some(event),
                Ok(_) => None,
                Err(e) => {
                    warn!("Seat channel for {} lagged: {}", showtime_id, e);
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// Seat events relayed through Redis pub/sub, one channel per showtime
#[derive(Clone)]
pub struct RedisSeatChannel {
    redis: RedisClient,
}

impl RedisSeatChannel {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    pub async fn publish(&self, event: &SeatStatusEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(event)?;
        self.redis
            .publish(&seat_channel_name(&event.showtime_id.to_string()), &payload)
            .await
            .map_err(|e| CoreError::TransientError(e.to_string()))
    }
}

#[async_trait]
impl SeatStatusChannel for RedisSeatChannel {
    async fn join(&self, showtime_id: Uuid) -> CoreResult<SeatEventStream> {
        let messages = self
            .redis
            .subscribe(&seat_channel_name(&showtime_id.to_string()))
            .await
            .map_err(|e| CoreError::TransientError(e.to_string()))?;

        let stream = messages.filter_map(move |payload| async move {
            match serde_json::from_str::<SeatStatusEvent>(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    error!("Malformed seat event on {}: {}", showtime_id, e);
                    None
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_filters_by_showtime() {
        let hub = SeatStatusHub::default();
        let showtime_id = Uuid::new_v4();
        let other_showtime = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        let mut stream = hub.join(showtime_id).await.unwrap();
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(SeatStatusEvent::held(other_showtime, seat_id));
        hub.publish(SeatStatusEvent::held(showtime_id, seat_id));

        let event = stream.next().await.unwrap();
        assert_eq!(event.showtime_id, showtime_id);

        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
