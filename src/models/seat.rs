use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Rows and seats per row generated for a fresh event.
pub const SEAT_ROWS: [&str; 3] = ["A", "B", "C"];
pub const SEATS_PER_ROW: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: i64,
    pub event_id: i64,
    pub seat_number: String,
    pub sold: bool,
    pub owner_name: Option<String>,
    pub owner_id: Option<String>,
    /// Bumped on every successful write; a conditional update only commits
    /// when the stored version still matches the one that was read.
    pub version: i32,
}

impl Seat {
    pub fn unsold(id: i64, event_id: i64, seat_number: impl Into<String>) -> Self {
        Seat {
            id,
            event_id,
            seat_number: seat_number.into(),
            sold: false,
            owner_name: None,
            owner_id: None,
            version: 0,
        }
    }

    // sold => owners filled and version >= 1; unsold => no owners
    pub fn is_consistent(&self) -> bool {
        match (self.sold, self.owner_name.as_deref(), self.owner_id.as_deref()) {
            (true, Some(name), Some(id)) => !name.is_empty() && !id.is_empty() && self.version >= 1,
            (false, None, None) => true,
            _ => false,
        }
    }

    /// The state this seat moves to when `owner_name` buys it.
    pub fn sold_to(&self, owner_name: &str, owner_id: &str) -> Seat {
        Seat {
            sold: true,
            owner_name: Some(owner_name.to_string()),
            owner_id: Some(owner_id.to_string()),
            version: self.version + 1,
            ..self.clone()
        }
    }
}

/// A1..A5, B1..B5, C1..C5
pub fn default_seat_layout() -> Vec<String> {
    SEAT_ROWS
        .iter()
        .flat_map(|row| (1..=SEATS_PER_ROW).map(move |n| format!("{row}{n}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_seat_is_consistent() {
        let seat = Seat::unsold(1, 1, "A1");
        assert!(seat.is_consistent());
        assert_eq!(seat.version, 0);
    }

    #[test]
    fn sold_to_fills_owner_and_bumps_version() {
        let seat = Seat::unsold(7, 1, "B3");
        let sold = seat.sold_to("Alice", "u-1");

        assert!(sold.sold);
        assert_eq!(sold.owner_name.as_deref(), Some("Alice"));
        assert_eq!(sold.owner_id.as_deref(), Some("u-1"));
        assert_eq!(sold.version, 1);
        assert_eq!(sold.id, 7);
        assert!(sold.is_consistent());
    }

    #[test]
    fn half_populated_owner_is_inconsistent() {
        let mut seat = Seat::unsold(1, 1, "A1");
        seat.owner_name = Some("Bob".to_string());
        assert!(!seat.is_consistent());

        let mut sold = Seat::unsold(1, 1, "A1").sold_to("Bob", "");
        assert!(!sold.is_consistent());
        sold.owner_id = Some("u-2".to_string());
        sold.version = 0;
        assert!(!sold.is_consistent());
    }

    #[test]
    fn default_layout_has_fifteen_unique_seats() {
        let layout = default_seat_layout();
        assert_eq!(layout.len(), 15);
        assert_eq!(layout.first().map(String::as_str), Some("A1"));
        assert_eq!(layout.last().map(String::as_str), Some("C5"));

        let mut unique = layout.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), layout.len());
    }
}
