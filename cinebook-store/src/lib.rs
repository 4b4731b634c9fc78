pub mod app_config;
pub mod redis_repo;
pub mod channel;
pub mod inventory;
pub mod booking;
pub mod catalog_repo;
pub mod session_store;

pub use redis_repo::{HoldOutcome, RedisClient};
pub use channel::{RedisSeatChannel, SeatStatusHub};
pub use inventory::{MemoryInventory, MemorySeatInventory, RedisSeatInventory};
pub use booking::{MemoryBookingService, PriceList, RedisBookingService};
pub use catalog_repo::MemoryShowtimeCatalog;
pub use session_store::{open_session_store, FileSessionStore, MemorySessionStore, RedisSessionStore};
