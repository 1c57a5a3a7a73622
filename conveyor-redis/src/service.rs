//! Redis service: a shared client for cache-style access beside the queue.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

use crate::{RedisConfig, RedisError, Result, pubsub::PubSub};

/// Redis service providing a shared connection and convenience methods.
///
/// This is the entry point for application-side Redis access (caching,
/// flags, pub/sub). The task queue owns its own connection and does not go
/// through this service.
#[derive(Clone)]
pub struct RedisService {
    config: RedisConfig,
    connection: ConnectionManager,
}

impl RedisService {
    /// Create a new Redis service and verify the server is reachable.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.connection_url())
            .map_err(|e| RedisError::Config(e.to_string()))?;

        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        Ok(Self { config, connection })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Check if the connection is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Create a Pub/Sub client.
    pub fn pubsub(&self) -> Result<PubSub> {
        PubSub::new(self.config.clone())
    }

    /// Get a value.
    pub async fn get_value<T: redis::FromRedisValue>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<T> = conn.get(key).await?;
        Ok(value)
    }

    /// Set a value.
    pub async fn set_value<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        value: T,
    ) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    /// Set a value with expiration.
    pub async fn set_ex<T: redis::ToRedisArgs + redis::ToSingleRedisArg + Send + Sync>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    /// Delete a key.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let deleted: u32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    /// Check if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// Set expiration on a key.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection.clone();
        let result: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(result)
    }

    /// Publish a message to a channel.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<u32> {
        let mut conn = self.connection.clone();
        let receivers: u32 = conn
            .publish(channel, message)
            .await
            .map_err(|e| RedisError::Command(e.to_string()))?;
        Ok(receivers)
    }
}
