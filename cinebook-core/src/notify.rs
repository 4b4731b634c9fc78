use cinebook_shared::SeatId;
use tracing::{info, warn};

/// Transient user-facing notification raised by the booking flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Another session got there first
    SeatTaken { seat_ids: Vec<SeatId> },
    HoldFailed { seat_ids: Vec<SeatId>, reason: String },
    /// The running hold ran out and every seat was released
    HoldExpired,
    /// A persisted session was found but its hold had already run out
    PreviousHoldExpired,
    CheckoutFailed { reason: String },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Routes notices to the log when no UI sink is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::SeatTaken { seat_ids } => warn!("Seats already taken: {:?}", seat_ids),
            Notice::HoldFailed { seat_ids, reason } => {
                warn!("Could not hold seats {:?}: {}", seat_ids, reason)
            }
            Notice::HoldExpired => info!("Seat hold expired, selection cleared"),
            Notice::PreviousHoldExpired => info!("Previous seat hold expired"),
            Notice::CheckoutFailed { reason } => warn!("Checkout failed: {}", reason),
        }
    }
}
