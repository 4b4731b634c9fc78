use std::collections::HashSet;

use cinebook_shared::{RoomLayout, Seat, SeatCell, SeatType};
use uuid::Uuid;

/// Spreadsheet-style row label: 0 -> "A", 25 -> "Z", 26 -> "AA"
pub fn row_label(row: u16) -> String {
    let mut n = row as u32 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Parse a compact grid description, one line per row.
///
/// `N` normal, `V` VIP, `C` couple, `.` or `_` empty. Whitespace is ignored.
pub fn parse_grid(text: &str) -> Result<Vec<Vec<SeatType>>, LayoutError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| match c {
                    'N' | 'n' => Ok(SeatType::Normal),
                    'V' | 'v' => Ok(SeatType::Vip),
                    'C' | 'c' => Ok(SeatType::Couple),
                    '.' | '_' => Ok(SeatType::Empty),
                    other => Err(LayoutError::UnknownCellCode(other)),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

/// Materialize seats from a grid of cell types.
///
/// Seats are numbered per row, left to right, skipping aisles. Runs of
/// adjacent couple cells are paired two by two and each pair gets its own
/// token, so the partner never has to be guessed from adjacency later.
pub fn build_layout(room_id: Uuid, grid: &[Vec<SeatType>]) -> Result<RoomLayout, LayoutError> {
    let rows = grid.len() as u16;
    let columns = grid.iter().map(|r| r.len()).max().unwrap_or(0) as u16;

    let mut cells = Vec::new();
    let mut seats = Vec::new();
    let mut next_token: u32 = 1;

    for (row_idx, row_cells) in grid.iter().enumerate() {
        let row = row_idx as u16;
        let prefix = row_label(row);
        let mut number = 0;
        let mut open_pair: Option<u32> = None;

        for (col_idx, seat_type) in row_cells.iter().copied().enumerate() {
            let column = col_idx as u16;
            cells.push(SeatCell { row, column, seat_type });

            if seat_type != SeatType::Couple && open_pair.is_some() {
                return Err(LayoutError::UnpairedCoupleSeat(format!("{}{}", prefix, number)));
            }
            if seat_type == SeatType::Empty {
                continue;
            }

            number += 1;
            let pair_token = if seat_type == SeatType::Couple {
                match open_pair.take() {
                    Some(token) => Some(token),
                    None => {
                        let token = next_token;
                        next_token += 1;
                        open_pair = Some(token);
                        Some(token)
                    }
                }
            } else {
                None
            };

            seats.push(Seat {
                id: Uuid::new_v4(),
                row,
                column,
                seat_type,
                label: format!("{}{}", prefix, number),
                pair_token,
            });
        }

        if open_pair.is_some() {
            return Err(LayoutError::UnpairedCoupleSeat(format!("{}{}", prefix, number)));
        }
    }

    let layout = RoomLayout { room_id, rows, columns, cells, seats };
    validate_layout(&layout)?;
    Ok(layout)
}

/// Check layouts received from elsewhere: ids are unique and every couple
/// seat has exactly one adjacent partner carrying the same token.
pub fn validate_layout(layout: &RoomLayout) -> Result<(), LayoutError> {
    let mut ids = HashSet::new();
    for seat in &layout.seats {
        if !ids.insert(seat.id) {
            return Err(LayoutError::DuplicateSeat(seat.label.clone()));
        }
    }

    for seat in layout.seats.iter().filter(|s| s.seat_type == SeatType::Couple) {
        let token = seat
            .pair_token
            .ok_or_else(|| LayoutError::UnpairedCoupleSeat(seat.label.clone()))?;

        let partners: Vec<&Seat> = layout
            .seats
            .iter()
            .filter(|s| {
                s.id != seat.id
                    && s.row == seat.row
                    && s.seat_type == SeatType::Couple
                    && s.pair_token == Some(token)
            })
            .collect();

        match partners.as_slice() {
            [partner] if partner.column.abs_diff(seat.column) == 1 => {}
            [] => return Err(LayoutError::UnpairedCoupleSeat(seat.label.clone())),
            _ => return Err(LayoutError::InvalidPair(seat.label.clone())),
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Couple seat without a partner: {0}")]
    UnpairedCoupleSeat(String),

    #[error("Couple seat with an ambiguous or non-adjacent partner: {0}")]
    InvalidPair(String),

    #[error("Duplicate seat: {0}")]
    DuplicateSeat(String),

    #[error("Unknown cell code: {0}")]
    UnknownCellCode(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_labels() {
        assert_eq!(row_label(0), "A");
        assert_eq!(row_label(25), "Z");
        assert_eq!(row_label(26), "AA");
    }

    #[test]
    fn test_build_layout_numbers_and_pairs() {
        let grid = parse_grid("NN.NN\nVV.CC\nCCCC.").unwrap();
        let layout = build_layout(Uuid::new_v4(), &grid).unwrap();

        assert_eq!(layout.rows, 3);
        assert_eq!(layout.columns, 5);
        assert_eq!(layout.seats.len(), 12);

        // Aisles do not consume a seat number
        let a3 = layout.seat_by_label("A3").unwrap();
        assert_eq!(a3.column, 3);

        let b3 = layout.seat_by_label("B3").unwrap();
        let b4 = layout.seat_by_label("B4").unwrap();
        assert_eq!(layout.partner_of(&b3.id).unwrap().id, b4.id);

        // Four couple cells in a row form two distinct pairs
        let c1 = layout.seat_by_label("C1").unwrap();
        let c2 = layout.seat_by_label("C2").unwrap();
        let c3 = layout.seat_by_label("C3").unwrap();
        assert_eq!(layout.partner_of(&c1.id).unwrap().id, c2.id);
        assert_ne!(c2.pair_token, c3.pair_token);
    }

    #[test]
    fn test_odd_couple_run_is_rejected() {
        let grid = parse_grid("CCC").unwrap();
        let result = build_layout(Uuid::new_v4(), &grid);
        assert!(matches!(result, Err(LayoutError::UnpairedCoupleSeat(_))));

        let grid = parse_grid("NC.N").unwrap();
        assert!(build_layout(Uuid::new_v4(), &grid).is_err());
    }

    #[test]
    fn test_validate_rejects_distant_partner() {
        let grid = parse_grid("CC.N").unwrap();
        let mut layout = build_layout(Uuid::new_v4(), &grid).unwrap();
        layout.seats[1].column = 3;

        assert!(matches!(validate_layout(&layout), Err(LayoutError::InvalidPair(_))));
    }

    #[test]
    fn test_unknown_cell_code() {
        assert_eq!(parse_grid("NX"), Err(LayoutError::UnknownCellCode('X')));
    }
}
