pub mod booking;
pub mod catalog;
pub mod channel;
pub mod clock;
pub mod inventory;
pub mod notify;
pub mod rules;
pub mod session;

pub use booking::{BookingConfirmation, BookingRequest, BookingService, FoodLine};
pub use catalog::ShowtimeCatalog;
pub use channel::{SeatEventStream, SeatStatusChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use inventory::SeatInventory;
pub use notify::{LogNotifier, Notice, Notifier};
pub use rules::BookingRules;
pub use session::{session_key, SessionStore};

/// Failure taxonomy shared by every collaborator the booking sheet talks to
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Seat already held by another session or already booked
    #[error("Conflict: {0}")]
    ConflictError(String),
    /// Network or backend hiccup; the operation may succeed if retried later
    #[error("Transient failure: {0}")]
    TransientError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::ConflictError(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
