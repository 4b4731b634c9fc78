use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerPhase {
    Idle,
    Running,
    /// Checkout or payment in flight; the deadline is kept but never fires
    Suspended,
    Expired,
}

/// Countdown for how long a session may keep its seats
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldTimer {
    expires_at: Option<DateTime<Utc>>,
    suspended: bool,
}

impl HoldTimer {
    /// Start the countdown unless one is already running
    pub fn arm(&mut self, now: DateTime<Utc>, hold: Duration) -> DateTime<Utc> {
        *self.expires_at.get_or_insert(now + hold)
    }

    /// Pick up a deadline carried over from a persisted session
    pub fn restore(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.suspended = false;
    }

    pub fn disarm(&mut self) {
        self.expires_at = None;
        self.suspended = false;
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn phase(&self, now: DateTime<Utc>) -> TimerPhase {
        match self.expires_at {
            None => TimerPhase::Idle,
            Some(_) if self.suspended => TimerPhase::Suspended,
            Some(at) if at <= now => TimerPhase::Expired,
            Some(_) => TimerPhase::Running,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == TimerPhase::Expired
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|at| (at - now).max(Duration::zero()))
    }
}
