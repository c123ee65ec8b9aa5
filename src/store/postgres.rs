use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{SeatStore, StoreError, WriteOutcome};
use crate::models::Seat;

#[derive(Clone)]
pub struct PgSeatStore {
    pool: PgPool,
}

impl PgSeatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeatStore for PgSeatStore {
    async fn get(&self, event_id: i64, seat_number: &str) -> Result<Option<Seat>, StoreError> {
        let seat = sqlx::query_as::<_, Seat>(
            "SELECT id, event_id, seat_number, sold, owner_name, owner_id, version
             FROM seats
             WHERE event_id = $1 AND seat_number = $2",
        )
        .bind(event_id)
        .bind(seat_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn conditional_update(
        &self,
        seat: &Seat,
        expected_version: i32,
    ) -> Result<WriteOutcome, StoreError> {
        // The version predicate makes check-and-set a single statement
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET sold = $1, owner_name = $2, owner_id = $3, version = $4
            WHERE id = $5 AND version = $6
            "#,
        )
        .bind(seat.sold)
        .bind(seat.owner_name.as_deref())
        .bind(seat.owner_id.as_deref())
        .bind(seat.version)
        .bind(seat.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(WriteOutcome::Committed)
        } else {
            Ok(WriteOutcome::VersionConflict)
        }
    }

    async fn list_by_event(&self, event_id: i64) -> Result<Vec<Seat>, StoreError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, event_id, seat_number, sold, owner_name, owner_id, version
             FROM seats
             WHERE event_id = $1
             ORDER BY seat_number",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Seat>, StoreError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, event_id, seat_number, sold, owner_name, owner_id, version
             FROM seats
             WHERE owner_id = $1
             ORDER BY event_id, seat_number",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn create_batch(
        &self,
        event_id: i64,
        seat_numbers: &[String],
    ) -> Result<Vec<Seat>, StoreError> {
        let result = sqlx::query_as::<_, Seat>(
            r#"
            INSERT INTO seats (event_id, seat_number)
            SELECT $1, seat_number FROM UNNEST($2::text[]) AS t(seat_number)
            RETURNING id, event_id, seat_number, sold, owner_name, owner_id, version
            "#,
        )
        .bind(event_id)
        .bind(seat_numbers)
        .fetch_all(&self.pool)
        .await;

        match result {
            Ok(seats) => {
                info!("Created {} seats for event {}", seats.len(), event_id);
                Ok(seats)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                warn!("Seat generation for event {} hit existing seats", event_id);
                Err(StoreError::DuplicateSeats { event_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reset(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM seats").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
