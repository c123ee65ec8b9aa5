use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// One purchase attempt: a buyer wants one seat of one event.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(range(min = 1))]
    pub event_id: i64,
    #[validate(length(min = 1, max = 16))]
    pub seat_number: String,
    #[validate(length(min = 1, max = 100))]
    pub buyer_name: String,
    #[validate(length(min = 1, max = 100))]
    pub buyer_id: String,
}

impl BookingRequest {
    pub fn new(
        event_id: i64,
        seat_number: impl Into<String>,
        buyer_name: impl Into<String>,
        buyer_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            seat_number: seat_number.into(),
            buyer_name: buyer_name.into(),
            buyer_id: buyer_id.into(),
        }
    }
}

/// Every expected way a booking attempt can end. These are values, not
/// errors: a lost race is normal under load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingOutcome {
    Success {
        buyer_name: String,
        seat_number: String,
        version: i32,
    },
    /// Seat already sold. Also returned when the version-checked write was
    /// rejected inside the lock.
    AlreadySold {
        seat_number: String,
        owner_name: Option<String>,
    },
    /// Lock not granted inside the wait window, or lock backend down.
    Contended,
    NotFound {
        event_id: i64,
        seat_number: String,
    },
    /// Shutdown arrived while waiting for the lock.
    Interrupted,
}

impl BookingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BookingOutcome::Success { .. })
    }
}

impl fmt::Display for BookingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingOutcome::Success {
                buyer_name,
                seat_number,
                ..
            } => write!(f, "SUCCESS: {} booked {}", buyer_name, seat_number),
            BookingOutcome::AlreadySold {
                seat_number,
                owner_name: Some(owner),
            } => write!(f, "FAILED: Seat {} is already taken by {}", seat_number, owner),
            BookingOutcome::AlreadySold {
                seat_number,
                owner_name: None,
            } => write!(f, "FAILED: Seat {} is already taken", seat_number),
            BookingOutcome::Contended => {
                write!(f, "FAILED: Seat is currently being processed by someone else")
            }
            BookingOutcome::NotFound {
                event_id,
                seat_number,
            } => write!(f, "Error: Seat {} not found for Event {}", seat_number, event_id),
            BookingOutcome::Interrupted => write!(f, "Error: Interrupted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_render_as_boundary_messages() {
        let success = BookingOutcome::Success {
            buyer_name: "User7".to_string(),
            seat_number: "A1".to_string(),
            version: 1,
        };
        assert_eq!(success.to_string(), "SUCCESS: User7 booked A1");

        let taken = BookingOutcome::AlreadySold {
            seat_number: "A1".to_string(),
            owner_name: Some("User7".to_string()),
        };
        assert_eq!(taken.to_string(), "FAILED: Seat A1 is already taken by User7");

        let taken_anon = BookingOutcome::AlreadySold {
            seat_number: "A1".to_string(),
            owner_name: None,
        };
        assert_eq!(taken_anon.to_string(), "FAILED: Seat A1 is already taken");

        assert_eq!(
            BookingOutcome::Contended.to_string(),
            "FAILED: Seat is currently being processed by someone else"
        );

        let missing = BookingOutcome::NotFound {
            event_id: 1,
            seat_number: "Z9".to_string(),
        };
        assert_eq!(missing.to_string(), "Error: Seat Z9 not found for Event 1");
        assert_eq!(BookingOutcome::Interrupted.to_string(), "Error: Interrupted");
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(BookingOutcome::Contended).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "CONTENDED" }));

        let json = serde_json::to_value(BookingOutcome::NotFound {
            event_id: 1,
            seat_number: "Z9".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "NOT_FOUND");
        assert_eq!(json["seat_number"], "Z9");
    }

    #[test]
    fn request_validation() {
        assert!(BookingRequest::new(1, "A1", "Alice", "u-1").validate().is_ok());
        assert!(BookingRequest::new(0, "A1", "Alice", "u-1").validate().is_err());
        assert!(BookingRequest::new(1, "", "Alice", "u-1").validate().is_err());
        assert!(BookingRequest::new(1, "A1", "", "u-1").validate().is_err());
        assert!(BookingRequest::new(1, "A1", "Alice", "").validate().is_err());
    }
}
