pub mod error;
pub mod live;
pub mod persistence;
pub mod seat_map;
pub mod selection;
pub mod sheet;
pub mod timer;

pub use error::{SheetError, SheetResult};
pub use live::{apply_event, EventEffect};
pub use persistence::{Restored, SessionPersistence};
pub use seat_map::{render_seat_map, MapCell, SeatGrid, SeatMapView, SeatRow, SeatState, SeatTile};
pub use selection::SelectionState;
pub use sheet::{BookingSheet, CheckoutStage, SheetServices, SheetSnapshot, ToggleOutcome};
pub use timer::{HoldTimer, TimerPhase};
