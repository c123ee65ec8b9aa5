//! Seat persistence.
//!
//! Once a seat row exists it is only ever mutated through
//! [`SeatStore::conditional_update`], which commits only when the stored
//! version token still equals the one the caller read.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Seat;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemorySeatStore;
pub use postgres::PgSeatStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("event {event_id} already has seats")]
    DuplicateSeats { event_id: i64 },
}

/// Result of a version-checked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    VersionConflict,
}

#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn get(&self, event_id: i64, seat_number: &str) -> Result<Option<Seat>, StoreError>;

    /// Persists `seat` (owner fields, sold flag, version) if and only if the
    /// stored row still carries `expected_version`.
    async fn conditional_update(
        &self,
        seat: &Seat,
        expected_version: i32,
    ) -> Result<WriteOutcome, StoreError>;

    async fn list_by_event(&self, event_id: i64) -> Result<Vec<Seat>, StoreError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Seat>, StoreError>;

    /// Creates unsold seats for an event. All-or-nothing: if any of the seat
    /// numbers already exists for the event nothing is written.
    async fn create_batch(
        &self,
        event_id: i64,
        seat_numbers: &[String],
    ) -> Result<Vec<Seat>, StoreError>;

    /// Deletes every seat. Returns the number of rows removed.
    async fn reset(&self) -> Result<u64, StoreError>;
}
