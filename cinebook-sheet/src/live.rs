use std::collections::HashSet;

use cinebook_shared::{SeatId, SeatStatus, SeatStatusEvent};
use uuid::Uuid;

use crate::selection::SelectionState;

/// How a pushed seat event changed the local view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEffect {
    /// Event for a showtime this sheet is not showing
    Ignored,
    /// Our own hold or release coming back
    SelfEcho,
    Blocked,
    Unblocked,
}

/// Fold one event into the blocked set. Events apply in arrival order.
pub fn apply_event(
    active_showtime: Option<Uuid>,
    selection: &SelectionState,
    blocked: &mut HashSet<SeatId>,
    event: &SeatStatusEvent,
) -> EventEffect {
    if active_showtime != Some(event.showtime_id) {
        return EventEffect::Ignored;
    }
    if selection.contains(&event.seat_id) {
        return EventEffect::SelfEcho;
    }

    match event.status {
        SeatStatus::Held | SeatStatus::Booked => {
            blocked.insert(event.seat_id);
            EventEffect::Blocked
        }
        SeatStatus::Released => {
            blocked.remove(&event.seat_id);
            EventEffect::Unblocked
        }
    }
}
