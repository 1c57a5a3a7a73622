//! # Conveyor Redis
//!
//! Redis client integration for the Conveyor task queue.
//!
//! ## Features
//!
//! - **Configuration**: URL, ACL auth, and database selection from code or
//!   environment (`CONVEYOR_REDIS_*`)
//! - **Shared connection**: a cloneable [`RedisService`] over a single
//!   multiplexed connection
//! - **Pub/Sub**: channel subscriptions on dedicated connections
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor_redis::{RedisService, RedisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .build();
//!
//!     let redis = RedisService::new(config).await?;
//!
//!     redis.set_value("key", "value").await?;
//!     let value: Option<String> = redis.get_value("key").await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pubsub;
mod service;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pubsub::{Message, PubSub, Subscription};
pub use service::RedisService;

// Re-export redis crate for convenience
pub use redis;
pub use redis::{AsyncCommands, RedisResult, Value};

/// Prelude for common imports.
///
/// ```
/// use conveyor_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::error::{RedisError, Result};
    pub use crate::pubsub::{Message, PubSub, Subscription};
    pub use crate::service::RedisService;
    pub use redis::AsyncCommands;
}
