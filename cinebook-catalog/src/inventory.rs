use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use cinebook_shared::SeatId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-limited claim on one seat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatHold {
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ShowtimeSeats {
    holds: HashMap<SeatId, SeatHold>,
    booked: HashSet<SeatId>,
}

/// In-memory seat inventory shared by every session of a process
pub struct InventoryBoard {
    showtimes: HashMap<Uuid, ShowtimeSeats>,
    hold_ttl: Duration,
}

impl InventoryBoard {
    pub fn new(hold_ttl: Duration) -> Self {
        Self {
            showtimes: HashMap::new(),
            hold_ttl,
        }
    }

    /// Hold a seat for `holder`. An expired hold of someone else is taken over,
    /// an own live hold is refreshed.
    pub fn hold(&mut self, showtime_id: Uuid, seat_id: SeatId, holder: &str, now: DateTime<Utc>) -> Result<(), InventoryError> {
        let ttl = self.hold_ttl;
        let seats = self.showtimes.entry(showtime_id).or_default();

        if seats.booked.contains(&seat_id) {
            return Err(InventoryError::AlreadyBooked(seat_id));
        }

        if let Some(existing) = seats.holds.get(&seat_id) {
            if existing.holder != holder && existing.expires_at > now {
                return Err(InventoryError::AlreadyHeld(seat_id));
            }
        }

        seats.holds.insert(seat_id, SeatHold {
            holder: holder.to_string(),
            expires_at: now + ttl,
        });

        Ok(())
    }

    /// Drop the hold if `holder` owns it. Returns whether anything was released.
    pub fn release(&mut self, showtime_id: Uuid, seat_id: SeatId, holder: &str) -> bool {
        let Some(seats) = self.showtimes.get_mut(&showtime_id) else {
            return false;
        };

        match seats.holds.get(&seat_id) {
            Some(hold) if hold.holder == holder => {
                seats.holds.remove(&seat_id);
                true
            }
            _ => false,
        }
    }

    /// Live holds of every session, sorted for stable output
    pub fn held(&self, showtime_id: Uuid, now: DateTime<Utc>) -> Vec<SeatId> {
        let mut held: Vec<SeatId> = self
            .showtimes
            .get(&showtime_id)
            .map(|seats| {
                seats.holds.iter()
                    .filter(|(_, hold)| hold.expires_at > now)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default();
        held.sort();
        held
    }

    pub fn booked(&self, showtime_id: Uuid) -> Vec<SeatId> {
        let mut booked: Vec<SeatId> = self
            .showtimes
            .get(&showtime_id)
            .map(|seats| seats.booked.iter().copied().collect())
            .unwrap_or_default();
        booked.sort();
        booked
    }

    pub fn holder_of(&self, showtime_id: Uuid, seat_id: &SeatId, now: DateTime<Utc>) -> Option<&str> {
        self.showtimes
            .get(&showtime_id)?
            .holds
            .get(seat_id)
            .filter(|hold| hold.expires_at > now)
            .map(|hold| hold.holder.as_str())
    }

    /// Turn holds into bookings. All seats must be live holds of `holder`;
    /// nothing changes if any of them is not.
    pub fn commit(&mut self, showtime_id: Uuid, seat_ids: &[SeatId], holder: &str, now: DateTime<Utc>) -> Result<(), InventoryError> {
        for seat_id in seat_ids {
            if self.holder_of(showtime_id, seat_id, now) != Some(holder) {
                return Err(InventoryError::NotHeld(*seat_id));
            }
        }

        let seats = self.showtimes.entry(showtime_id).or_default();
        for seat_id in seat_ids {
            seats.holds.remove(seat_id);
            seats.booked.insert(*seat_id);
        }

        Ok(())
    }

    /// Drop expired holds, returning what was freed
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<(Uuid, SeatId)> {
        let mut freed = Vec::new();
        for (showtime_id, seats) in self.showtimes.iter_mut() {
            seats.holds.retain(|seat_id, hold| {
                if hold.expires_at <= now {
                    freed.push((*showtime_id, *seat_id));
                    false
                } else {
                    true
                }
            });
        }
        freed
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Seat already held: {0}")]
    AlreadyHeld(SeatId),

    #[error("Seat already booked: {0}")]
    AlreadyBooked(SeatId),

    #[error("Seat not held by caller: {0}")]
    NotHeld(SeatId),
}
