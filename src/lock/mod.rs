//! Per-seat mutual exclusion.
//!
//! A [`LockService`] grants a key to one holder at a time. Every grant
//! carries a lease after which the backend drops the key by itself, so a
//! crashed holder can block a seat for at most one lease.
//!
//! Holders identify themselves with a random token. `release` only removes
//! the key while it still carries the caller's token, which makes it safe to
//! call after the lease expired or when the lock was never granted.
//!
//! [`LockGuard`] wraps acquire/release into a scope: release happens through
//! [`LockGuard::release`] on the normal path and from `Drop` on every other
//! path (panics, cancelled futures).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod in_memory;
pub mod redis_lock;

pub use in_memory::InMemoryLockService;
pub use redis_lock::RedisLockService;

pub const DEFAULT_LEASE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LockService: Send + Sync {
    /// Tries to take `key` for `token`.
    ///
    /// With `wait == 0` this never queues: a held key returns `Ok(false)` at
    /// once. An unreachable backend is an error, which callers must treat as
    /// not granted.
    async fn acquire(
        &self,
        key: &str,
        token: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<bool, LockError>;

    /// Drops `key` if it is still held by `token`. Idempotent.
    async fn release(&self, key: &str, token: &str) -> Result<(), LockError>;
}

/// Lock key for one seat of one event.
pub fn seat_lock_key(event_id: i64, seat_number: &str) -> String {
    format!("lock:event:{}:seat:{}", event_id, seat_number)
}

/// Scoped ownership of one lock key.
pub struct LockGuard {
    service: Arc<dyn LockService>,
    key: String,
    token: String,
    // set while the key may be ours: from the moment acquire is sent until
    // it is released or known to be refused
    armed: bool,
}

impl LockGuard {
    pub fn new(service: Arc<dyn LockService>, key: impl Into<String>) -> Self {
        Self {
            service,
            key: key.into(),
            token: Uuid::new_v4().to_string(),
            armed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    #[cfg(test)]
    fn token(&self) -> &str {
        &self.token
    }

    pub async fn acquire(&mut self, wait: Duration, lease: Duration) -> Result<bool, LockError> {
        // Armed before the request goes out: if this future is dropped
        // mid-flight the backend may still have granted the key.
        self.armed = true;
        let granted = self.service.acquire(&self.key, &self.token, wait, lease).await;
        // An error may hide a grant that landed (e.g. a timed-out SET), so
        // only an explicit refusal disarms.
        self.armed = !matches!(granted, Ok(false));
        granted
    }

    pub async fn release(mut self) {
        if !self.armed {
            return;
        }
        // stays armed until the backend answers, so a cancelled release
        // is retried from Drop
        let released = self.service.release(&self.key, &self.token).await;
        self.armed = false;
        match released {
            Ok(()) => debug!(key = %self.key, "Released seat lock"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to release seat lock, lease will expire it"),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let service = Arc::clone(&self.service);
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = service.release(&key, &token).await {
                        warn!(key = %key, error = %e, "Failed to release dropped seat lock");
                    }
                });
            }
            Err(_) => warn!(key = %key, "Seat lock dropped outside a runtime, lease will expire it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_keys_are_scoped_by_event_and_seat() {
        assert_eq!(seat_lock_key(1, "A1"), "lock:event:1:seat:A1");
        assert_ne!(seat_lock_key(1, "A1"), seat_lock_key(2, "A1"));
        assert_ne!(seat_lock_key(1, "A1"), seat_lock_key(1, "A2"));
    }

    #[test]
    fn every_guard_gets_its_own_token() {
        let locks: Arc<dyn LockService> = Arc::new(InMemoryLockService::new());
        let a = LockGuard::new(Arc::clone(&locks), seat_lock_key(1, "A1"));
        let b = LockGuard::new(locks, seat_lock_key(1, "A1"));

        assert_eq!(a.key(), b.key());
        assert_ne!(a.token(), b.token());
    }

    #[tokio::test]
    async fn guard_release_frees_the_key() {
        let locks = Arc::new(InMemoryLockService::new());
        let mut guard = LockGuard::new(locks.clone(), "k");

        assert!(guard.acquire(Duration::ZERO, DEFAULT_LEASE).await.unwrap());
        assert!(locks.is_held("k"));

        guard.release().await;
        assert!(!locks.is_held("k"));
    }

    #[tokio::test]
    async fn refused_guard_does_not_release_the_holder() {
        let locks = Arc::new(InMemoryLockService::new());
        let mut holder = LockGuard::new(locks.clone(), "k");
        let mut loser = LockGuard::new(locks.clone(), "k");

        assert!(holder.acquire(Duration::ZERO, DEFAULT_LEASE).await.unwrap());
        assert!(!loser.acquire(Duration::ZERO, DEFAULT_LEASE).await.unwrap());

        loser.release().await;
        assert!(locks.is_held("k"));
        holder.release().await;
        assert!(!locks.is_held("k"));
    }

    struct FlakyBackend {
        inner: InMemoryLockService,
    }

    #[async_trait]
    impl LockService for FlakyBackend {
        async fn acquire(
            &self,
            key: &str,
            token: &str,
            wait: Duration,
            lease: Duration,
        ) -> Result<bool, LockError> {
            self.inner.acquire(key, token, wait, lease).await?;
            Err(LockError::Unavailable("SET timed out".to_string()))
        }

        async fn release(&self, key: &str, token: &str) -> Result<(), LockError> {
            self.inner.release(key, token).await
        }
    }

    #[tokio::test]
    async fn errored_acquire_keeps_the_guard_armed() {
        let locks = Arc::new(FlakyBackend {
            inner: InMemoryLockService::new(),
        });
        let mut guard = LockGuard::new(locks.clone(), "k");

        assert!(guard.acquire(Duration::ZERO, DEFAULT_LEASE).await.is_err());
        assert!(locks.inner.is_held("k"));

        guard.release().await;
        assert!(!locks.inner.is_held("k"));
    }

    #[tokio::test]
    async fn dropped_guard_releases_in_background() {
        let locks = Arc::new(InMemoryLockService::new());
        {
            let mut guard = LockGuard::new(locks.clone(), "k");
            assert!(guard.acquire(Duration::ZERO, DEFAULT_LEASE).await.unwrap());
        }

        for _ in 0..100 {
            if !locks.is_held("k") {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!locks.is_held("k"));
    }
}
