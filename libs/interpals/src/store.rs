//! Session persistence in Redis

use std::sync::Arc;

use common::InterpalsResult;
use common::cache::{RedisConfig, RedisPool};
use tracing::info;

use crate::session::{Session, SessionSnapshot};
use crate::transport::Transport;

/// Stores session snapshots keyed by username
#[derive(Clone)]
pub struct SessionStore {
    redis_pool: RedisPool,
    ttl: u64,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(redis_pool: RedisPool, ttl: u64) -> Self {
        Self { redis_pool, ttl }
    }

    /// Create a session store from the Redis configuration
    pub fn from_config(config: &RedisConfig) -> InterpalsResult<Self> {
        Ok(Self::new(RedisPool::new(config)?, config.session_ttl))
    }

    fn key(username: &str) -> String {
        format!("session:{username}")
    }

    /// Save the session of its owner, replacing any previous one
    pub async fn save(&self, session: &Session) -> InterpalsResult<()> {
        info!("Saving session for user: {}", session.username());

        let snapshot = serde_json::to_string(&session.snapshot())?;
        self.redis_pool
            .set(&Self::key(session.username()), &snapshot, Some(self.ttl))
            .await?;

        Ok(())
    }

    /// Get the stored snapshot of `username`
    pub async fn snapshot(&self, username: &str) -> InterpalsResult<Option<SessionSnapshot>> {
        let Some(json) = self.redis_pool.get(&Self::key(username)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Restore the stored session of `username`
    pub async fn load(
        &self,
        username: &str,
        transport: Arc<dyn Transport>,
    ) -> InterpalsResult<Option<Session>> {
        info!("Loading session for user: {}", username);

        match self.snapshot(username).await? {
            Some(snapshot) => Ok(Some(Session::restore(snapshot, transport)?)),
            None => Ok(None),
        }
    }

    /// Delete the stored session of `username`, reporting whether it existed
    pub async fn delete(&self, username: &str) -> InterpalsResult<bool> {
        info!("Deleting session for user: {}", username);
        self.redis_pool.delete(&Self::key(username)).await
    }

    /// Get Redis health status
    pub async fn health_check(&self) -> InterpalsResult<bool> {
        self.redis_pool.health_check().await
    }
}
