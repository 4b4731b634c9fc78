use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The showtime a booking sheet is working against.
///
/// Prices are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeSelection {
    pub id: Uuid,
    pub room_id: Uuid,
    pub base_price: i64,
    pub vip_surcharge: i64,
    pub couple_surcharge: i64,
}

/// Concession item offered alongside tickets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoodItem {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}
