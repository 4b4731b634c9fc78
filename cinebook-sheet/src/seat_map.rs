use std::collections::HashSet;
use std::fmt;

use cinebook_catalog::row_label;
use cinebook_shared::{RoomLayout, Seat, SeatId, SeatType};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Available,
    Selected,
    /// Held by another session or booked
    Blocked,
    /// A hold or release is in flight
    Processing,
    /// The ticket quantity leaves no room for another seat of this type
    Disabled,
}

/// One clickable tile. Couple pairs are merged into a single two-column tile.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatTile {
    pub seat_ids: Vec<SeatId>,
    pub label: String,
    pub seat_type: SeatType,
    pub state: SeatState,
    pub column: u16,
    pub span: u16,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MapCell {
    Aisle,
    Seat(SeatTile),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SeatRow {
    pub label: String,
    pub cells: Vec<MapCell>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SeatGrid {
    pub rows: Vec<SeatRow>,
}

impl SeatGrid {
    pub fn tiles(&self) -> impl Iterator<Item = &SeatTile> {
        self.rows.iter().flat_map(|row| row.cells.iter()).filter_map(|cell| match cell {
            MapCell::Seat(tile) => Some(tile),
            MapCell::Aisle => None,
        })
    }

    pub fn tile(&self, seat_id: &SeatId) -> Option<&SeatTile> {
        self.tiles().find(|tile| tile.seat_ids.contains(seat_id))
    }
}

/// Session state the map is projected from
pub struct SeatMapView<'a> {
    pub selected: &'a HashSet<SeatId>,
    pub blocked: &'a HashSet<SeatId>,
    pub processing: &'a HashSet<SeatId>,
    pub disabled: &'a [SeatType],
}

impl SeatMapView<'_> {
    fn state_of(&self, seat_ids: &[SeatId], seat_type: SeatType) -> SeatState {
        let any = |set: &HashSet<SeatId>| seat_ids.iter().any(|id| set.contains(id));

        if any(self.processing) {
            SeatState::Processing
        } else if any(self.selected) {
            SeatState::Selected
        } else if any(self.blocked) {
            SeatState::Blocked
        } else if self.disabled.contains(&seat_type) {
            SeatState::Disabled
        } else {
            SeatState::Available
        }
    }
}

/// Project seat states onto the room grid
pub fn render_seat_map(layout: &RoomLayout, view: &SeatMapView<'_>) -> SeatGrid {
    let mut rows = Vec::with_capacity(layout.rows as usize);

    for row in 0..layout.rows {
        let mut cells = Vec::new();
        let mut column = 0;

        while column < layout.columns {
            let Some(seat) = layout.seat_at(row, column) else {
                cells.push(MapCell::Aisle);
                column += 1;
                continue;
            };

            let partner = merged_partner(layout, seat);
            let (seat_ids, label, span) = match partner {
                Some(partner) => (
                    vec![seat.id, partner.id],
                    format!("{}-{}", seat.label, partner.label),
                    2,
                ),
                None => (vec![seat.id], seat.label.clone(), 1),
            };

            cells.push(MapCell::Seat(SeatTile {
                state: view.state_of(&seat_ids, seat.seat_type),
                seat_ids,
                label,
                seat_type: seat.seat_type,
                column,
                span,
            }));
            column += span;
        }

        rows.push(SeatRow { label: row_label(row), cells });
    }

    SeatGrid { rows }
}

/// Right-hand partner of a couple seat, if the pair starts here
fn merged_partner<'a>(layout: &'a RoomLayout, seat: &Seat) -> Option<&'a Seat> {
    if seat.seat_type != SeatType::Couple {
        return None;
    }
    layout
        .partner_of(&seat.id)
        .filter(|partner| partner.column == seat.column + 1)
}

impl fmt::Display for SeatGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            write!(f, "{:>2} ", row.label)?;
            for cell in &row.cells {
                match cell {
                    MapCell::Aisle => write!(f, " ")?,
                    MapCell::Seat(tile) => {
                        let glyph = match tile.state {
                            SeatState::Available => 'o',
                            SeatState::Selected => '*',
                            SeatState::Blocked => 'x',
                            SeatState::Processing => '~',
                            SeatState::Disabled => '-',
                        };
                        for _ in 0..tile.span {
                            write!(f, "{}", glyph)?;
                        }
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinebook_catalog::{build_layout, parse_grid};
    use uuid::Uuid;

    #[test]
    fn test_couples_merge_and_aisles_render() {
        let layout = build_layout(Uuid::new_v4(), &parse_grid("NN.N\nCC.V").unwrap()).unwrap();
        let a1 = layout.seat_by_label("A1").unwrap().id;
        let a2 = layout.seat_by_label("A2").unwrap().id;
        let b1 = layout.seat_by_label("B1").unwrap().id;
        let b2 = layout.seat_by_label("B2").unwrap().id;

        let selected = HashSet::from([b2]);
        let blocked = HashSet::from([a2]);
        let processing = HashSet::new();
        let view = SeatMapView {
            selected: &selected,
            blocked: &blocked,
            processing: &processing,
            disabled: &[SeatType::Vip],
        };

        let grid = render_seat_map(&layout, &view);

        let couple = grid.tile(&b1).unwrap();
        assert_eq!(couple.seat_ids, vec![b1, b2]);
        assert_eq!(couple.span, 2);
        assert_eq!(couple.label, "B1-B2");
        assert_eq!(couple.state, SeatState::Selected);

        assert_eq!(grid.tile(&a1).unwrap().state, SeatState::Available);
        assert_eq!(grid.tile(&a2).unwrap().state, SeatState::Blocked);
        assert_eq!(grid.rows[1].cells.len(), 3);
        assert_eq!(grid.to_string(), " A ox o\n B ** -\n");
    }

    #[test]
    fn test_processing_wins() {
        let layout = build_layout(Uuid::new_v4(), &parse_grid("N").unwrap()).unwrap();
        let a1 = layout.seats[0].id;
        let set = HashSet::from([a1]);
        let empty = HashSet::new();

        let view = SeatMapView { selected: &set, blocked: &empty, processing: &set, disabled: &[] };
        assert_eq!(render_seat_map(&layout, &view).tile(&a1).unwrap().state, SeatState::Processing);
    }
}
