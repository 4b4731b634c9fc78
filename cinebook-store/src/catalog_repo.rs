use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cinebook_core::{CoreError, CoreResult, ShowtimeCatalog};
use cinebook_shared::{FoodItem, RoomLayout};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Room layouts and concession menu held in memory
#[derive(Clone, Default)]
pub struct MemoryShowtimeCatalog {
    rooms: Arc<RwLock<HashMap<Uuid, RoomLayout>>>,
    menu: Arc<RwLock<Vec<FoodItem>>>,
}

impl MemoryShowtimeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_room(&self, layout: RoomLayout) {
        self.rooms.write().await.insert(layout.room_id, layout);
    }

    pub async fn set_menu(&self, menu: Vec<FoodItem>) {
        *self.menu.write().await = menu;
    }
}

#[async_trait]
impl ShowtimeCatalog for MemoryShowtimeCatalog {
    async fn room_layout(&self, room_id: Uuid) -> CoreResult<RoomLayout> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Room {}", room_id)))
    }

    async fn food_menu(&self) -> CoreResult<Vec<FoodItem>> {
        Ok(self.menu.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinebook_catalog::{build_layout, parse_grid};

    #[tokio::test]
    async fn test_room_lookup() {
        let catalog = MemoryShowtimeCatalog::new();
        let room_id = Uuid::new_v4();
        let layout = build_layout(room_id, &parse_grid("NN.NN\nVVCCV").unwrap()).unwrap();
        catalog.add_room(layout.clone()).await;

        assert_eq!(catalog.room_layout(room_id).await.unwrap(), layout);
        assert!(matches!(
            catalog.room_layout(Uuid::new_v4()).await,
            Err(CoreError::NotFound(_))
        ));
        assert!(catalog.food_menu().await.unwrap().is_empty());
    }
}
