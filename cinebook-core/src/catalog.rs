use async_trait::async_trait;
use cinebook_shared::{FoodItem, RoomLayout};
use uuid::Uuid;

use crate::CoreResult;

/// Read access to room layouts and the concession menu
#[async_trait]
pub trait ShowtimeCatalog: Send + Sync {
    async fn room_layout(&self, room_id: Uuid) -> CoreResult<RoomLayout>;

    async fn food_menu(&self) -> CoreResult<Vec<FoodItem>>;
}
