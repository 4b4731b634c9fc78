use cinebook_catalog::LayoutError;
use cinebook_core::CoreError;
use cinebook_shared::SeatId;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("No showtime selected")]
    NoActiveShowtime,

    #[error("Unknown seat: {0}")]
    UnknownSeat(SeatId),

    #[error("Unknown food item: {0}")]
    UnknownFood(Uuid),

    #[error("Selected seats do not match the ticket quantities")]
    NotEnoughSeats,

    #[error("A checkout is already in progress")]
    CheckoutInProgress,

    #[error("Seats are still being held or released")]
    SeatsInFlight,

    #[error("No booking is awaiting payment")]
    NoPendingPayment,

    #[error("Invalid room layout: {0}")]
    InvalidLayout(#[from] LayoutError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SheetError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SheetError::Core(err) if err.is_conflict())
    }
}

pub type SheetResult<T> = Result<T, SheetError>;
