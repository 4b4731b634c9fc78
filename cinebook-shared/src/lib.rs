pub mod models;

pub use models::events::{SeatStatus, SeatStatusEvent};
pub use models::seat::{RoomLayout, Seat, SeatCell, SeatId, SeatType, TicketType};
pub use models::session::{SessionRecord, TicketQuantities};
pub use models::showtime::{FoodItem, ShowtimeSelection};
