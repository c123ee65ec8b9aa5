use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::{SeatStore, StoreError, WriteOutcome};
use crate::models::Seat;

/// Seat store kept in process memory, keyed by (event id, seat number).
///
/// The version check and the write happen under one write lock, which gives
/// the same compare-and-set semantics as the `UPDATE ... WHERE version = $n`
/// used by [`super::PgSeatStore`].
#[derive(Default)]
pub struct InMemorySeatStore {
    seats: RwLock<HashMap<(i64, String), Seat>>,
    next_id: AtomicI64,
}

impl InMemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.seats.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seats.read().await.is_empty()
    }
}

#[async_trait]
impl SeatStore for InMemorySeatStore {
    async fn get(&self, event_id: i64, seat_number: &str) -> Result<Option<Seat>, StoreError> {
        let seats = self.seats.read().await;
        Ok(seats.get(&(event_id, seat_number.to_string())).cloned())
    }

    async fn conditional_update(
        &self,
        seat: &Seat,
        expected_version: i32,
    ) -> Result<WriteOutcome, StoreError> {
        let mut seats = self.seats.write().await;
        match seats.get_mut(&(seat.event_id, seat.seat_number.clone())) {
            Some(stored) if stored.id == seat.id && stored.version == expected_version => {
                *stored = seat.clone();
                Ok(WriteOutcome::Committed)
            }
            _ => Ok(WriteOutcome::VersionConflict),
        }
    }

    async fn list_by_event(&self, event_id: i64) -> Result<Vec<Seat>, StoreError> {
        let seats = self.seats.read().await;
        let mut found: Vec<Seat> = seats
            .values()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(found)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Seat>, StoreError> {
        let seats = self.seats.read().await;
        let mut found: Vec<Seat> = seats
            .values()
            .filter(|s| s.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.event_id, &a.seat_number).cmp(&(b.event_id, &b.seat_number)));
        Ok(found)
    }

    async fn create_batch(
        &self,
        event_id: i64,
        seat_numbers: &[String],
    ) -> Result<Vec<Seat>, StoreError> {
        let mut seats = self.seats.write().await;

        let mut requested = std::collections::HashSet::new();
        let clashes = seat_numbers.iter().any(|number| {
            !requested.insert(number.as_str()) || seats.contains_key(&(event_id, number.clone()))
        });
        if clashes {
            return Err(StoreError::DuplicateSeats { event_id });
        }

        let created: Vec<Seat> = seat_numbers
            .iter()
            .map(|number| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                Seat::unsold(id, event_id, number.clone())
            })
            .collect();
        for seat in &created {
            seats.insert((event_id, seat.seat_number.clone()), seat.clone());
        }
        Ok(created)
    }

    async fn reset(&self) -> Result<u64, StoreError> {
        let mut seats = self.seats.write().await;
        let removed = seats.len() as u64;
        seats.clear();
        Ok(removed)
    }
}
