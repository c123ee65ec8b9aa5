//! Booking coordinator.
//!
//! A seat is sold at most once because two independent guards sit in front
//! of every write:
//!
//! 1. the per-seat lock from [`LockService`], acquired without waiting, which
//!    turns away the crowd that lost the race with [`BookingOutcome::Contended`];
//! 2. the version-checked write on [`SeatStore`], which rejects any writer that
//!    got past a lock it should not have.
//!
//! The lock is released before [`BookingCoordinator::book`] returns, whatever
//! happened inside the critical section.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

use crate::lock::{seat_lock_key, LockGuard, LockService, DEFAULT_LEASE};
use crate::notify::{seats_topic, NotificationBroadcaster};
use crate::store::{SeatStore, StoreError, WriteOutcome};
use crate::shutdown_requested;

mod outcome;

pub use outcome::{BookingOutcome, BookingRequest};

/// Defects that are not part of the booking protocol.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid booking request: {0}")]
    InvalidRequest(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("seat {seat_number} of event {event_id} has an inconsistent owner/sold state")]
    CorruptedSeat { event_id: i64, seat_number: String },
}

#[derive(Debug, Clone, Copy)]
pub struct BookingSettings {
    /// How long to wait for a held seat lock. Zero means refuse at once.
    pub lock_wait: Duration,
    /// Upper bound on how long a lock survives its holder.
    pub lock_lease: Duration,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            lock_wait: Duration::ZERO,
            lock_lease: DEFAULT_LEASE,
        }
    }
}

pub struct BookingCoordinator {
    seats: Arc<dyn SeatStore>,
    locks: Arc<dyn LockService>,
    notifier: Arc<dyn NotificationBroadcaster>,
    settings: BookingSettings,
    shutdown: watch::Receiver<bool>,
}

impl BookingCoordinator {
    pub fn new(
        seats: Arc<dyn SeatStore>,
        locks: Arc<dyn LockService>,
        notifier: Arc<dyn NotificationBroadcaster>,
        settings: BookingSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            seats,
            locks,
            notifier,
            settings,
            shutdown,
        }
    }

    pub fn settings(&self) -> BookingSettings {
        self.settings
    }

    pub async fn book(&self, request: &BookingRequest) -> Result<BookingOutcome, BookingError> {
        request.validate()?;

        let key = seat_lock_key(request.event_id, &request.seat_number);
        let mut guard = LockGuard::new(Arc::clone(&self.locks), key);

        let acquired = tokio::select! {
            biased;
            _ = shutdown_requested(self.shutdown.clone()) => None,
            granted = guard.acquire(self.settings.lock_wait, self.settings.lock_lease) => Some(granted),
        };

        match acquired {
            None => {
                // The grant may have landed just before the signal
                guard.release().await;
                info!(
                    event_id = request.event_id,
                    seat = %request.seat_number,
                    "Booking interrupted while waiting for seat lock"
                );
                return Ok(BookingOutcome::Interrupted);
            }
            Some(Ok(true)) => {}
            Some(Ok(false)) => {
                debug!(
                    key = guard.key(),
                    buyer = %request.buyer_id,
                    "Seat lock held by another buyer"
                );
                return Ok(BookingOutcome::Contended);
            }
            Some(Err(e)) => {
                // the SET may have landed before the error surfaced
                guard.release().await;
                warn!(
                    event_id = request.event_id,
                    seat = %request.seat_number,
                    error = %e,
                    "Lock backend unavailable, refusing booking"
                );
                return Ok(BookingOutcome::Contended);
            }
        }

        let result = AssertUnwindSafe(self.locked_attempt(request))
            .catch_unwind()
            .await;
        guard.release().await;

        let outcome = match result {
            Ok(outcome) => outcome?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        if let BookingOutcome::Success { version, .. } = &outcome {
            info!(
                event_id = request.event_id,
                seat = %request.seat_number,
                buyer = %request.buyer_id,
                version,
                "Seat sold"
            );
            self.notifier
                .publish(&seats_topic(request.event_id), &request.seat_number);
        }
        Ok(outcome)
    }

    // Runs with the seat lock held.
    async fn locked_attempt(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingOutcome, BookingError> {
        let Some(seat) = self
            .seats
            .get(request.event_id, &request.seat_number)
            .await?
        else {
            debug!(
                event_id = request.event_id,
                seat = %request.seat_number,
                "Seat not found"
            );
            return Ok(BookingOutcome::NotFound {
                event_id: request.event_id,
                seat_number: request.seat_number.clone(),
            });
        };

        if !seat.is_consistent() {
            return Err(BookingError::CorruptedSeat {
                event_id: seat.event_id,
                seat_number: seat.seat_number,
            });
        }

        if seat.sold {
            debug!(
                event_id = request.event_id,
                seat = %request.seat_number,
                "Seat already sold"
            );
            return Ok(BookingOutcome::AlreadySold {
                seat_number: seat.seat_number,
                owner_name: seat.owner_name,
            });
        }

        let expected_version = seat.version;
        let sold = seat.sold_to(&request.buyer_name, &request.buyer_id);

        match self.seats.conditional_update(&sold, expected_version).await? {
            WriteOutcome::Committed => Ok(BookingOutcome::Success {
                buyer_name: request.buyer_name.clone(),
                seat_number: sold.seat_number,
                version: sold.version,
            }),
            WriteOutcome::VersionConflict => {
                // Someone wrote this seat without holding its lock
                warn!(
                    event_id = request.event_id,
                    seat = %request.seat_number,
                    expected_version,
                    "Version conflict inside seat lock"
                );
                let owner_name = self
                    .seats
                    .get(request.event_id, &request.seat_number)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|s| s.owner_name);
                Ok(BookingOutcome::AlreadySold {
                    seat_number: request.seat_number.clone(),
                    owner_name,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::InMemoryLockService;
    use crate::notify::ChannelBroadcaster;
    use crate::store::InMemorySeatStore;

    struct Harness {
        coordinator: BookingCoordinator,
        seats: Arc<InMemorySeatStore>,
        locks: Arc<InMemoryLockService>,
        notifications: Arc<ChannelBroadcaster>,
        shutdown: watch::Sender<bool>,
    }

    async fn harness(seat_numbers: &[&str]) -> Harness {
        let seats = Arc::new(InMemorySeatStore::new());
        let numbers: Vec<String> = seat_numbers.iter().map(|s| s.to_string()).collect();
        seats.create_batch(1, &numbers).await.unwrap();

        let locks = Arc::new(InMemoryLockService::new());
        let notifications = Arc::new(ChannelBroadcaster::new(16));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let coordinator = BookingCoordinator::new(
            seats.clone(),
            locks.clone(),
            notifications.clone(),
            BookingSettings::default(),
            shutdown_rx,
        );
        Harness {
            coordinator,
            seats,
            locks,
            notifications,
            shutdown: shutdown_tx,
        }
    }

    #[tokio::test]
    async fn first_booking_wins_and_bumps_version() {
        let h = harness(&["A1"]).await;
        let mut rx = h.notifications.subscribe();

        let outcome = h
            .coordinator
            .book(&BookingRequest::new(1, "A1", "Alice", "u-1"))
            .await
            .unwrap();

        assert_eq!(outcome.to_string(), "SUCCESS: Alice booked A1");
        let seat = h.seats.get(1, "A1").await.unwrap().unwrap();
        assert_eq!(seat.version, 1);
        assert_eq!(seat.owner_id.as_deref(), Some("u-1"));
        assert_eq!(h.locks.held_count(), 0);

        let note = rx.recv().await.unwrap();
        assert_eq!(note.topic, seats_topic(1));
        assert_eq!(note.seat_number, "A1");
    }

    #[tokio::test]
    async fn held_lock_means_contended() {
        let h = harness(&["A1"]).await;
        let key = seat_lock_key(1, "A1");
        assert!(h
            .locks
            .acquire(&key, "someone-else", Duration::ZERO, DEFAULT_LEASE)
            .await
            .unwrap());

        let outcome = h
            .coordinator
            .book(&BookingRequest::new(1, "A1", "Bob", "u-2"))
            .await
            .unwrap();
        assert_eq!(outcome, BookingOutcome::Contended);

        // the other holder keeps its lock, and the seat is untouched
        assert!(h.locks.is_held(&key));
        assert!(!h.seats.get(1, "A1").await.unwrap().unwrap().sold);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_locking() {
        let h = harness(&["A1"]).await;
        let err = h
            .coordinator
            .book(&BookingRequest::new(1, "A1", "", "u-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
        assert_eq!(h.locks.held_count(), 0);
    }

    #[tokio::test]
    async fn signalled_shutdown_interrupts_without_touching_the_seat() {
        let h = harness(&["A1"]).await;
        h.shutdown.send(true).unwrap();

        let outcome = h
            .coordinator
            .book(&BookingRequest::new(1, "A1", "Alice", "u-1"))
            .await
            .unwrap();
        assert_eq!(outcome, BookingOutcome::Interrupted);
        assert_eq!(h.locks.held_count(), 0);
        assert!(!h.seats.get(1, "A1").await.unwrap().unwrap().sold);
    }

    #[tokio::test]
    async fn dropped_shutdown_sender_does_not_interrupt() {
        let seats = Arc::new(InMemorySeatStore::new());
        seats.create_batch(1, &["A1".to_string()]).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        let coordinator = BookingCoordinator::new(
            seats,
            Arc::new(InMemoryLockService::new()),
            Arc::new(ChannelBroadcaster::new(1)),
            BookingSettings::default(),
            shutdown_rx,
        );
        let outcome = coordinator
            .book(&BookingRequest::new(1, "A1", "Alice", "u-1"))
            .await
            .unwrap();
        assert!(outcome.is_success());
    }
}
