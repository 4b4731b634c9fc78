use async_trait::async_trait;
use cinebook_shared::SeatStatusEvent;
use futures_util::stream::BoxStream;
use uuid::Uuid;

use crate::CoreResult;

/// Seat transitions pushed for one showtime. Dropping the stream leaves the channel.
pub type SeatEventStream = BoxStream<'static, SeatStatusEvent>;

/// Push subscription scoped to a showtime
#[async_trait]
pub trait SeatStatusChannel: Send + Sync {
    async fn join(&self, showtime_id: Uuid) -> CoreResult<SeatEventStream>;
}
