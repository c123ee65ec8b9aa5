use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{LockError, LockService};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Lease {
    token: String,
    expires_at: Instant,
}

/// Process-local lock service with the same lease and token semantics as
/// [`super::RedisLockService`]. Used for single-node runs and tests.
#[derive(Default)]
pub struct InMemoryLockService {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while `key` has an unexpired holder.
    pub fn is_held(&self, key: &str) -> bool {
        self.leases
            .lock()
            .map(|leases| leases.get(key).is_some_and(|l| l.expires_at > Instant::now()))
            .unwrap_or(false)
    }

    /// Number of keys with an unexpired holder.
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.leases
            .lock()
            .map(|leases| leases.values().filter(|l| l.expires_at > now).count())
            .unwrap_or(0)
    }

    fn try_take(&self, key: &str, token: &str, lease: Duration) -> Result<bool, LockError> {
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Unavailable(e.to_string()))?;
        let now = Instant::now();

        if let Some(current) = leases.get(key) {
            if current.expires_at > now {
                return Ok(false);
            }
        }
        leases.insert(
            key.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: now + lease,
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn acquire(
        &self,
        key: &str,
        token: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<bool, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if self.try_take(key, token, lease)? {
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
        let mut leases = self
            .leases
            .lock()
            .map_err(|e| LockError::Unavailable(e.to_string()))?;
        if leases.get(key).is_some_and(|l| l.token == token) {
            leases.remove(key);
        }
        Ok(())
    }
}
