//! Redis cache module for the Interpals client
//!
//! This module provides the Redis connection used to persist session
//! snapshots between process runs, with get/set/delete and TTL support.

use redis::{AsyncCommands, Client};
use tracing::info;

use crate::config::parse_var;
use crate::error::InterpalsResult;

/// Default lifetime of a stored session, in seconds (7 days)
pub const DEFAULT_SESSION_TTL: u64 = 604_800;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Time-to-live applied to stored sessions, in seconds
    pub session_ttl: u64,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_SESSION_TTL`: stored session lifetime in seconds (default: 604800)
    pub fn from_env() -> InterpalsResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let session_ttl = parse_var("REDIS_SESSION_TTL", DEFAULT_SESSION_TTL)?;

        Ok(RedisConfig { url, session_ttl })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub fn new(config: &RedisConfig) -> InterpalsResult<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> InterpalsResult<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> InterpalsResult<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn.set_ex(key, value, ttl).await?;
        } else {
            let _: () = conn.set(key, value).await?;
        }

        Ok(())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> InterpalsResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Delete a key from Redis, reporting whether it existed
    pub async fn delete(&self, key: &str) -> InterpalsResult<bool> {
        let mut conn = self.get_connection().await?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> InterpalsResult<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
