use serde::Deserialize;

/// Booking limits and timings shared by the sheet and the adapters
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BookingRules {
    /// How long a session may keep seats before they are released
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_max_tickets")]
    pub max_tickets_per_type: u32,
    /// Server-side lock TTL; outlives the client hold so the client times out first
    #[serde(default = "default_seat_lock_seconds")]
    pub seat_lock_seconds: u64,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

fn default_hold_seconds() -> u64 { 300 }
fn default_max_tickets() -> u32 { 5 }
fn default_seat_lock_seconds() -> u64 { 360 }
fn default_tick_millis() -> u64 { 1000 }

impl BookingRules {
    pub fn hold_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_seconds as i64)
    }

    pub fn seat_lock_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seat_lock_seconds as i64)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_millis.max(1))
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            max_tickets_per_type: default_max_tickets(),
            seat_lock_seconds: default_seat_lock_seconds(),
            tick_millis: default_tick_millis(),
        }
    }
}
