pub mod events;
pub mod seat;
pub mod session;
pub mod showtime;
