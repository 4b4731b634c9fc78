pub mod layout;
pub mod pricing;
pub mod inventory;

pub use layout::{build_layout, parse_grid, row_label, validate_layout, LayoutError};
pub use pricing::{PriceSummary, PricingEngine};
pub use inventory::{InventoryBoard, InventoryError, SeatHold};
