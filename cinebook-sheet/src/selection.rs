use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cinebook_shared::{RoomLayout, SeatId, SessionRecord, TicketQuantities, TicketType};
use uuid::Uuid;

/// Seats, ticket quantities and concessions picked for one showtime.
///
/// Seats keep their insertion order so auto-release can drop the most
/// recently added ones first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    seats: Vec<(SeatId, TicketType)>,
    quantities: TicketQuantities,
    food: BTreeMap<Uuid, u32>,
}

impl SelectionState {
    pub fn new(quantities: TicketQuantities, food: BTreeMap<Uuid, u32>) -> Self {
        Self {
            seats: Vec::new(),
            quantities,
            food: food.into_iter().filter(|(_, qty)| *qty > 0).collect(),
        }
    }

    pub fn quantities(&self) -> TicketQuantities {
        self.quantities
    }

    pub fn food(&self) -> &BTreeMap<Uuid, u32> {
        &self.food
    }

    pub fn seat_ids(&self) -> Vec<SeatId> {
        self.seats.iter().map(|(id, _)| *id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Nothing worth persisting: no seats, tickets or food
    pub fn is_blank(&self) -> bool {
        self.seats.is_empty() && self.quantities.is_empty() && self.food.is_empty()
    }

    pub fn contains(&self, seat_id: &SeatId) -> bool {
        self.seats.iter().any(|(id, _)| id == seat_id)
    }

    /// Returns false if the seat was already selected
    pub fn insert(&mut self, seat_id: SeatId, ticket: TicketType) -> bool {
        if self.contains(&seat_id) {
            return false;
        }
        self.seats.push((seat_id, ticket));
        true
    }

    pub fn remove(&mut self, seat_id: &SeatId) -> bool {
        let before = self.seats.len();
        self.seats.retain(|(id, _)| id != seat_id);
        self.seats.len() != before
    }

    pub fn count_of(&self, ticket: TicketType) -> u32 {
        self.seats.iter().filter(|(_, t)| *t == ticket).count() as u32
    }

    /// Physical seats the current quantity pays for
    pub fn capacity(&self, ticket: TicketType) -> u32 {
        self.quantities.get(ticket) * ticket.seats_per_ticket()
    }

    pub fn can_select(&self, ticket: TicketType, seats: u32) -> bool {
        self.count_of(ticket) + seats <= self.capacity(ticket)
    }

    /// Ticket types that cannot take another seat
    pub fn full_types(&self) -> Vec<TicketType> {
        TicketType::ALL
            .into_iter()
            .filter(|ticket| !self.can_select(*ticket, ticket.seats_per_ticket()))
            .collect()
    }

    /// Clamp the quantity to `[0, max]` and drop seats the new quantity no
    /// longer covers. Returns the dropped seats, most recent first.
    pub fn update_quantity(&mut self, ticket: TicketType, delta: i32, max: u32, layout: &RoomLayout) -> Vec<SeatId> {
        let current = self.quantities.get(ticket) as i64;
        let next = (current + delta as i64).clamp(0, max as i64) as u32;
        self.quantities.set(ticket, next);
        self.trim_to_capacity(ticket, layout)
    }

    /// Couple seats leave as whole pairs
    pub fn trim_to_capacity(&mut self, ticket: TicketType, layout: &RoomLayout) -> Vec<SeatId> {
        let mut dropped = Vec::new();

        while self.count_of(ticket) > self.capacity(ticket) {
            let Some(index) = self.seats.iter().rposition(|(_, t)| *t == ticket) else {
                break;
            };
            let (seat_id, _) = self.seats.remove(index);
            dropped.push(seat_id);

            if ticket == TicketType::Couple {
                if let Some(partner) = layout.partner_of(&seat_id) {
                    if self.remove(&partner.id) {
                        dropped.push(partner.id);
                    }
                }
            }
        }

        dropped
    }

    /// Returns the new quantity. Zero removes the item.
    pub fn update_food(&mut self, food_id: Uuid, delta: i32) -> u32 {
        let current = self.food.get(&food_id).copied().unwrap_or(0) as i64;
        let next = (current + delta as i64).max(0) as u32;
        if next == 0 {
            self.food.remove(&food_id);
        } else {
            self.food.insert(food_id, next);
        }
        next
    }

    /// Every ticket maps to exactly its seats and at least one ticket is bought
    pub fn is_enough_seats(&self) -> bool {
        !self.quantities.is_empty()
            && TicketType::ALL
                .iter()
                .all(|ticket| self.count_of(*ticket) == self.capacity(*ticket))
    }

    pub fn to_record(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            quantities: self.quantities,
            selected_seats: self.seat_ids(),
            food_quantities: self.food.clone(),
            expires_at,
            timestamp: now,
        }
    }

    pub fn clear(&mut self) {
        self.seats.clear();
        self.quantities = TicketQuantities::default();
        self.food.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinebook_catalog::{build_layout, parse_grid};

    fn layout() -> RoomLayout {
        build_layout(Uuid::new_v4(), &parse_grid("NNNN\nCCCC").unwrap()).unwrap()
    }

    fn id(layout: &RoomLayout, label: &str) -> SeatId {
        layout.seat_by_label(label).unwrap().id
    }

    #[test]
    fn test_decrement_drops_latest_seat() {
        let layout = layout();
        let mut selection = SelectionState::default();
        selection.update_quantity(TicketType::Standard, 2, 5, &layout);

        selection.insert(id(&layout, "A1"), TicketType::Standard);
        selection.insert(id(&layout, "A2"), TicketType::Standard);
        assert!(selection.is_enough_seats());
        assert!(!selection.can_select(TicketType::Standard, 1));

        let dropped = selection.update_quantity(TicketType::Standard, -1, 5, &layout);
        assert_eq!(dropped, vec![id(&layout, "A2")]);
        assert_eq!(selection.seat_ids(), vec![id(&layout, "A1")]);
    }

    #[test]
    fn test_couple_decrement_drops_whole_pair() {
        let layout = layout();
        let mut selection = SelectionState::default();
        selection.update_quantity(TicketType::Couple, 2, 5, &layout);

        for label in ["B1", "B2", "B3", "B4"] {
            selection.insert(id(&layout, label), TicketType::Couple);
        }
        assert_eq!(selection.capacity(TicketType::Couple), 4);
        assert!(selection.is_enough_seats());

        let dropped = selection.update_quantity(TicketType::Couple, -1, 5, &layout);
        assert_eq!(dropped, vec![id(&layout, "B4"), id(&layout, "B3")]);
        assert_eq!(selection.count_of(TicketType::Couple), 2);
    }

    #[test]
    fn test_quantity_is_clamped() {
        let layout = layout();
        let mut selection = SelectionState::default();

        selection.update_quantity(TicketType::Vip, 9, 5, &layout);
        assert_eq!(selection.quantities().vip, 5);

        selection.update_quantity(TicketType::Vip, -9, 5, &layout);
        assert_eq!(selection.quantities().vip, 0);
    }

    #[test]
    fn test_enough_seats_needs_exact_match() {
        let layout = layout();
        let mut selection = SelectionState::default();
        assert!(!selection.is_enough_seats());

        selection.update_quantity(TicketType::Standard, 1, 5, &layout);
        selection.update_quantity(TicketType::Couple, 1, 5, &layout);
        selection.insert(id(&layout, "A1"), TicketType::Standard);
        assert!(!selection.is_enough_seats());

        selection.insert(id(&layout, "B1"), TicketType::Couple);
        selection.insert(id(&layout, "B2"), TicketType::Couple);
        assert!(selection.is_enough_seats());
        // VIP has no tickets, so it is full as well
        assert_eq!(selection.full_types(), TicketType::ALL.to_vec());
    }

    #[test]
    fn test_food_quantities() {
        let mut selection = SelectionState::default();
        let popcorn = Uuid::new_v4();

        assert_eq!(selection.update_food(popcorn, 2), 2);
        assert_eq!(selection.update_food(popcorn, -5), 0);
        assert!(selection.food().is_empty());
        assert_eq!(selection.update_food(popcorn, -1), 0);
    }
}
