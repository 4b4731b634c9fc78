use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::seat::SeatId;

/// Seat transition broadcast on a showtime channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Held,
    Booked,
    Released,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatStatusEvent {
    pub showtime_id: Uuid,
    pub seat_id: SeatId,
    pub status: SeatStatus,
}

impl SeatStatusEvent {
    pub fn new(showtime_id: Uuid, seat_id: SeatId, status: SeatStatus) -> Self {
        Self { showtime_id, seat_id, status }
    }

    pub fn held(showtime_id: Uuid, seat_id: SeatId) -> Self {
        Self::new(showtime_id, seat_id, SeatStatus::Held)
    }

    pub fn booked(showtime_id: Uuid, seat_id: SeatId) -> Self {
        Self::new(showtime_id, seat_id, SeatStatus::Booked)
    }

    pub fn released(showtime_id: Uuid, seat_id: SeatId) -> Self {
        Self::new(showtime_id, seat_id, SeatStatus::Released)
    }
}
