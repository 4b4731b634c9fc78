use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::seat::{SeatId, TicketType};

/// Ticket counts per type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketQuantities {
    pub standard: u32,
    pub vip: u32,
    pub couple: u32,
}

impl TicketQuantities {
    pub fn get(&self, ticket: TicketType) -> u32 {
        match ticket {
            TicketType::Standard => self.standard,
            TicketType::Vip => self.vip,
            TicketType::Couple => self.couple,
        }
    }

    pub fn set(&mut self, ticket: TicketType, value: u32) {
        match ticket {
            TicketType::Standard => self.standard = value,
            TicketType::Vip => self.vip = value,
            TicketType::Couple => self.couple = value,
        }
    }

    pub fn total(&self) -> u32 {
        self.standard + self.vip + self.couple
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Snapshot of an in-progress selection, keyed by showtime in the session store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub quantities: TicketQuantities,
    pub selected_seats: Vec<SeatId>,
    #[serde(default)]
    pub food_quantities: BTreeMap<Uuid, u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

impl SessionRecord {
    /// A record is stale once its hold deadline has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_json_shape() {
        let now = Utc::now();
        let food_id = Uuid::new_v4();
        let record = SessionRecord {
            quantities: TicketQuantities { standard: 2, vip: 0, couple: 1 },
            selected_seats: vec![Uuid::new_v4()],
            food_quantities: BTreeMap::from([(food_id, 3)]),
            expires_at: Some(now + Duration::minutes(5)),
            timestamp: now,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["quantities"]["standard"], 2);
        assert_eq!(json["foodQuantities"][food_id.to_string()], 3);
        assert!(json["expiresAt"].is_string());

        let parsed: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_expiry() {
        let now = Utc::now();
        let mut record = SessionRecord {
            quantities: TicketQuantities::default(),
            selected_seats: vec![],
            food_quantities: BTreeMap::new(),
            expires_at: None,
            timestamp: now,
        };
        assert!(!record.is_expired(now));

        record.expires_at = Some(now - Duration::seconds(1));
        assert!(record.is_expired(now));
    }
}
