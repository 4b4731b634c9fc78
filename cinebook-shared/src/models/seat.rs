use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SeatId = Uuid;

/// Physical seat type of a grid cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Normal,
    Vip,
    Couple,
    Empty,
}

impl SeatType {
    /// Ticket type that pays for a seat of this type. `Empty` cells are aisles.
    pub fn ticket_type(&self) -> Option<TicketType> {
        match self {
            SeatType::Normal => Some(TicketType::Standard),
            SeatType::Vip => Some(TicketType::Vip),
            SeatType::Couple => Some(TicketType::Couple),
            SeatType::Empty => None,
        }
    }
}

/// Ticket types sold per showtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    Standard,
    Vip,
    Couple,
}

impl TicketType {
    pub const ALL: [TicketType; 3] = [TicketType::Standard, TicketType::Vip, TicketType::Couple];

    /// Number of physical seats one ticket occupies
    pub fn seats_per_ticket(&self) -> u32 {
        match self {
            TicketType::Couple => 2,
            _ => 1,
        }
    }

    pub fn seat_type(&self) -> SeatType {
        match self {
            TicketType::Standard => SeatType::Normal,
            TicketType::Vip => SeatType::Vip,
            TicketType::Couple => SeatType::Couple,
        }
    }
}

/// One configured cell of a room grid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatCell {
    pub row: u16,
    pub column: u16,
    pub seat_type: SeatType,
}

/// A bookable seat materialized from the grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: SeatId,
    pub row: u16,
    pub column: u16,
    pub seat_type: SeatType,
    pub label: String,
    /// Shared by the two halves of a couple seat
    pub pair_token: Option<u32>,
}

/// Room grid plus the seats materialized from it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomLayout {
    pub room_id: Uuid,
    pub rows: u16,
    pub columns: u16,
    pub cells: Vec<SeatCell>,
    pub seats: Vec<Seat>,
}

impl RoomLayout {
    pub fn seat(&self, seat_id: &SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.id == seat_id)
    }

    pub fn seat_at(&self, row: u16, column: u16) -> Option<&Seat> {
        self.seats.iter().find(|s| s.row == row && s.column == column)
    }

    pub fn seat_by_label(&self, label: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.label == label)
    }

    /// The other half of a couple seat, matched on pairing token within the row
    pub fn partner_of(&self, seat_id: &SeatId) -> Option<&Seat> {
        let seat = self.seat(seat_id)?;
        let token = seat.pair_token?;
        self.seats.iter().find(|s| {
            s.id != seat.id
                && s.row == seat.row
                && s.seat_type == SeatType::Couple
                && s.pair_token == Some(token)
        })
    }
}
