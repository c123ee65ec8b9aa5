use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::PgSeatStore;

static MIGRATOR: Migrator = sqlx::migrate!("./src/migrations");

/// Postgres pool shared by the seat store and the event handlers.
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        // A booking holds its seat lock while it waits for a connection,
        // so pool starvation must surface well inside one lock lease.
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(2))
            .connect(&config.url)
            .await?;
        info!(pool_size = config.pool_size, "Postgres pool ready");

        Ok(Database { pool })
    }

    /// Applies the embedded events/seats schema.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await?;
        info!(migrations = MIGRATOR.iter().count(), "Schema up to date");
        Ok(())
    }

    pub fn seat_store(&self) -> PgSeatStore {
        PgSeatStore::new(self.pool.clone())
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}
