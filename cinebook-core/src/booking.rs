use async_trait::async_trait;
use cinebook_shared::{SeatId, TicketQuantities};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FoodLine {
    pub food_id: Uuid,
    pub quantity: u32,
}

/// Final booking submitted once every ticket maps to a held seat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<SeatId>,
    pub quantities: TicketQuantities,
    pub food_drinks: Vec<FoodLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub id: Uuid,
    pub total_price: i64,
}

#[async_trait]
pub trait BookingService: Send + Sync {
    /// Turn the caller's holds into a confirmed booking
    async fn create_booking(&self, request: &BookingRequest) -> CoreResult<BookingConfirmation>;
}
