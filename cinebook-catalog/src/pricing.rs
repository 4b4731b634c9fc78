use std::collections::{BTreeMap, HashMap};

use cinebook_shared::{FoodItem, ShowtimeSelection, TicketQuantities, TicketType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Totals in minor currency units
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceSummary {
    pub tickets: i64,
    pub food: i64,
    pub total: i64,
}

/// Prices tickets and concessions for one showtime
#[derive(Debug, Clone)]
pub struct PricingEngine {
    base_price: i64,
    vip_surcharge: i64,
    couple_surcharge: i64,
    menu: HashMap<Uuid, i64>,
}

impl PricingEngine {
    pub fn new(showtime: &ShowtimeSelection, menu: &[FoodItem]) -> Self {
        Self {
            base_price: showtime.base_price,
            vip_surcharge: showtime.vip_surcharge,
            couple_surcharge: showtime.couple_surcharge,
            menu: menu.iter().map(|item| (item.id, item.price)).collect(),
        }
    }

    /// Price of one ticket. A couple ticket seats two, so it carries two base fares.
    pub fn ticket_price(&self, ticket: TicketType) -> i64 {
        match ticket {
            TicketType::Standard => self.base_price,
            TicketType::Vip => self.base_price + self.vip_surcharge,
            TicketType::Couple => self.base_price * 2 + self.couple_surcharge,
        }
    }

    pub fn ticket_subtotal(&self, quantities: &TicketQuantities) -> i64 {
        TicketType::ALL
            .iter()
            .map(|ticket| self.ticket_price(*ticket) * quantities.get(*ticket) as i64)
            .sum()
    }

    /// Items missing from the menu contribute nothing
    pub fn food_subtotal(&self, food: &BTreeMap<Uuid, u32>) -> i64 {
        food.iter()
            .filter_map(|(id, qty)| self.menu.get(id).map(|price| price * *qty as i64))
            .sum()
    }

    pub fn is_on_menu(&self, food_id: &Uuid) -> bool {
        self.menu.contains_key(food_id)
    }

    pub fn has_menu(&self) -> bool {
        !self.menu.is_empty()
    }

    pub fn summarize(&self, quantities: &TicketQuantities, food: &BTreeMap<Uuid, u32>) -> PriceSummary {
        let tickets = self.ticket_subtotal(quantities);
        let food = self.food_subtotal(food);
        PriceSummary { tickets, food, total: tickets + food }
    }
}
