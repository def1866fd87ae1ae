//! Fail-fast distributed locks
//!
//! `try_lock` never waits: it either takes the key or reports that someone
//! else holds it. The TTL bounds how long a crashed holder can block others.

use async_trait::async_trait;
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Pool, Runtime};
use std::time::Duration;
use tracing::{debug, warn};

use super::keys::MessageLockKey;
use crate::types::{ApiError, Result};

/// How long a translation may hold its lock
pub const MESSAGE_LOCK_TTL: Duration = Duration::from_secs(10 * 60);

#[async_trait]
pub trait Locker: Send + Sync {
    /// Take `key` for `ttl`. Returns false when it is already held.
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Drop `key`. Releasing a lock nobody holds is not an error.
    async fn release(&self, key: &str) -> Result<()>;
}

/// Lock a message translation, mapping a conflict to 423
pub async fn lock_message(
    locker: &dyn Locker,
    prefix: &str,
    key: &MessageLockKey,
) -> Result<String> {
    let storage_key = key.to_storage_key(prefix);
    if locker.try_lock(&storage_key, MESSAGE_LOCK_TTL).await? {
        debug!(key = %storage_key, "lock acquired");
        Ok(storage_key)
    } else {
        Err(ApiError::Locked(format!(
            "{} is being translated to {}",
            key.id, key.language
        )))
    }
}

/// Best-effort release; failures only leave the key to expire
pub async fn unlock(locker: &dyn Locker, storage_key: &str) {
    if let Err(e) = locker.release(storage_key).await {
        warn!(key = %storage_key, error = %e, "failed to release lock");
    }
}

/// Redis-backed locker over a deadpool connection pool
#[derive(Clone)]
pub struct RedisLocker {
    pool: Pool,
}

impl RedisLocker {
    pub fn connect(url: &str) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ApiError::Config(format!("invalid redis config: {}", e)))?;
        Ok(Self { pool })
    }

    /// Round-trip a PING
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: String = cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Locker for RedisLocker {
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let reply: Option<String> = cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}
