pub mod booking;
pub mod config;
pub mod controllers;
pub mod database;
pub mod lock;
pub mod models;
pub mod notify;
pub mod redis_client;
pub mod store;

use std::sync::Arc;
use tokio::sync::watch;

use booking::{BookingCoordinator, BookingSettings};
use lock::RedisLockService;
use notify::ChannelBroadcaster;
use store::SeatStore;

/// Resolves once `shutdown` flips to `true`. Never resolves if the sender
/// is dropped without signalling.
pub async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub seats: Arc<dyn SeatStore>,
    pub coordinator: Arc<BookingCoordinator>,
    pub broadcaster: Arc<ChannelBroadcaster>,
}

impl AppState {
    /// Connects Postgres and Redis and wires the booking coordinator.
    /// Flipping `shutdown` to `true` interrupts bookings still waiting on a
    /// seat lock.
    pub async fn new(
        config: config::Config,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        db.migrate().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        tracing::info!("Redis connected");

        let seats: Arc<dyn SeatStore> = Arc::new(db.seat_store());
        let broadcaster = Arc::new(ChannelBroadcaster::new(config.booking.notify_capacity));
        let settings = BookingSettings {
            lock_wait: config.booking.lock_wait(),
            lock_lease: config.booking.lock_lease(),
        };
        let coordinator = Arc::new(BookingCoordinator::new(
            Arc::clone(&seats),
            Arc::new(RedisLockService::new(redis.clone())),
            broadcaster.clone(),
            settings,
            shutdown,
        ));

        Ok(Arc::new(Self {
            config,
            db,
            redis,
            seats,
            coordinator,
            broadcaster,
        }))
    }
}
