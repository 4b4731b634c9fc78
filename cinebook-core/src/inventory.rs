use async_trait::async_trait;
use cinebook_shared::SeatId;
use uuid::Uuid;

use crate::CoreResult;

/// Seat inventory of the backend, scoped to the calling session.
///
/// Holds are exclusive and time limited on the server side. No couple-seat
/// pairing happens here: callers issue one call per physical seat.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Hold one seat. Fails with `ConflictError` when another session holds it
    /// or it is already booked. Re-holding an own seat refreshes the hold.
    async fn hold_seat(&self, showtime_id: Uuid, seat_id: SeatId) -> CoreResult<()>;

    /// Release a hold acquired by this session. Releasing a seat that is not
    /// held by this session is a no-op.
    async fn release_seat(&self, showtime_id: Uuid, seat_id: SeatId) -> CoreResult<()>;

    /// Every live hold on the showtime, including this session's own
    async fn list_held_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatId>>;

    async fn list_booked_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatId>>;
}
