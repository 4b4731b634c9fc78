use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use cinebook_catalog::PricingEngine;
use cinebook_core::{BookingConfirmation, BookingRequest, BookingService, CoreError, CoreResult};
use cinebook_shared::SeatStatusEvent;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::channel::RedisSeatChannel;
use crate::inventory::MemoryInventory;
use crate::redis_repo::RedisClient;

/// Pricing engines per showtime, shared by the booking services
#[derive(Clone, Default)]
pub struct PriceList {
    engines: Arc<RwLock<HashMap<Uuid, PricingEngine>>>,
}

impl PriceList {
    pub async fn register(&self, showtime_id: Uuid, engine: PricingEngine) {
        self.engines.write().await.insert(showtime_id, engine);
    }

    /// Validate the request and total it in minor units
    pub async fn quote(&self, request: &BookingRequest) -> CoreResult<i64> {
        if request.seat_ids.is_empty() || request.quantities.is_empty() {
            return Err(CoreError::ValidationError("Booking has no seats".to_string()));
        }

        let engines = self.engines.read().await;
        let engine = engines
            .get(&request.showtime_id)
            .ok_or_else(|| CoreError::NotFound(format!("No pricing for showtime {}", request.showtime_id)))?;

        let food: BTreeMap<Uuid, u32> = request
            .food_drinks
            .iter()
            .map(|line| (line.food_id, line.quantity))
            .collect();
        Ok(engine.summarize(&request.quantities, &food).total)
    }
}

/// Books the seats a session holds on a [`MemoryInventory`]
#[derive(Clone)]
pub struct MemoryBookingService {
    inventory: MemoryInventory,
    holder: String,
    prices: PriceList,
}

impl MemoryBookingService {
    pub fn new(inventory: MemoryInventory, holder: impl Into<String>) -> Self {
        Self {
            inventory,
            holder: holder.into(),
            prices: PriceList::default(),
        }
    }

    pub fn with_prices(mut self, prices: PriceList) -> Self {
        self.prices = prices;
        self
    }

    /// Prices used to total bookings for a showtime
    pub async fn register_pricing(&self, showtime_id: Uuid, engine: PricingEngine) {
        self.prices.register(showtime_id, engine).await;
    }
}

#[async_trait]
impl BookingService for MemoryBookingService {
    async fn create_booking(&self, request: &BookingRequest) -> CoreResult<BookingConfirmation> {
        // 1. Validate and price before touching the inventory
        let total_price = self.prices.quote(request).await?;

        // 2. Commit holds
        self.inventory
            .commit(request.showtime_id, &request.seat_ids, &self.holder)
            .await?;

        let confirmation = BookingConfirmation {
            id: Uuid::new_v4(),
            total_price,
        };
        info!("Booking {} created for {} ({})", confirmation.id, self.holder, total_price);
        Ok(confirmation)
    }
}

/// Books the seats a session holds in Redis
#[derive(Clone)]
pub struct RedisBookingService {
    redis: RedisClient,
    channel: RedisSeatChannel,
    holder: String,
    prices: PriceList,
}

impl RedisBookingService {
    pub fn new(redis: RedisClient, holder: impl Into<String>, prices: PriceList) -> Self {
        Self {
            channel: RedisSeatChannel::new(redis.clone()),
            redis,
            holder: holder.into(),
            prices,
        }
    }
}

#[async_trait]
impl BookingService for RedisBookingService {
    async fn create_booking(&self, request: &BookingRequest) -> CoreResult<BookingConfirmation> {
        // 1. Validate and price
        let total_price = self.prices.quote(request).await?;

        // 2. Commit every lock atomically
        let showtime = request.showtime_id.to_string();
        let seat_ids: Vec<String> = request.seat_ids.iter().map(Uuid::to_string).collect();
        let committed = self
            .redis
            .commit_seats(&showtime, &seat_ids, &self.holder)
            .await
            .map_err(|e| CoreError::TransientError(e.to_string()))?;
        if !committed {
            return Err(CoreError::ConflictError(format!(
                "Seats on {} are no longer held by {}",
                showtime, self.holder
            )));
        }

        // 3. Announce the booked seats
        for seat_id in &request.seat_ids {
            if let Err(e) = self
                .channel
                .publish(&SeatStatusEvent::booked(request.showtime_id, *seat_id))
                .await
            {
                warn!("Failed to announce booked seat {}: {}", seat_id, e);
            }
        }

        let confirmation = BookingConfirmation {
            id: Uuid::new_v4(),
            total_price,
        };
        info!("Booking {} created for {} ({})", confirmation.id, self.holder, total_price);
        Ok(confirmation)
    }
}
