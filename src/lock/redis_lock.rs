use async_trait::async_trait;
use redis::Script;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::debug;

use super::{LockError, LockService};
use crate::redis_client::RedisClient;

// Deletes the key only while it still holds the caller's token
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Lock service backed by Redis keys written with `SET NX PX`.
///
/// The lease is the key's TTL, so Redis drops a lock whose holder died.
#[derive(Clone)]
pub struct RedisLockService {
    redis: RedisClient,
    release_script: Script,
}

impl RedisLockService {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    async fn try_set(&self, key: &str, token: &str, lease: Duration) -> Result<bool, LockError> {
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.redis.conn.clone();

        let reply = timeout(
            COMMAND_TIMEOUT,
            redis::cmd("SET")
                .arg(key)
                .arg(token)
                .arg("NX") // only if nobody holds it
                .arg("PX") // lease in milliseconds
                .arg(lease_ms)
                .query_async::<Option<String>>(&mut conn),
        )
        .await
        .map_err(|_| LockError::Unavailable(format!("SET {} timed out", key)))?
        .map_err(|e| LockError::Unavailable(e.to_string()))?;

        Ok(reply.is_some())
    }
}

#[async_trait]
impl LockService for RedisLockService {
    async fn acquire(
        &self,
        key: &str,
        token: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if self.try_set(key, token, lease).await? {
                debug!(key, "Acquired seat lock");
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, key: &str, token: &str) -> Result<(), LockError> {
        let mut conn = self.redis.conn.clone();
        let deleted: i64 = timeout(
            COMMAND_TIMEOUT,
            self.release_script.key(key).arg(token).invoke_async(&mut conn),
        )
        .await
        .map_err(|_| LockError::Unavailable(format!("release of {} timed out", key)))?
        .map_err(|e| LockError::Unavailable(e.to_string()))?;

        if deleted == 0 {
            debug!(key, "Seat lock already gone at release");
        }
        Ok(())
    }
}
