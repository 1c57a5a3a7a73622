//! Queue store implementation with Redis backend.

use crate::error::{QueueError, QueueResult};
use crate::task::{Task, TaskData, TaskId};
use chrono::{DateTime, Utc};
use conveyor_log::{debug, info, warn};
use conveyor_redis::RedisConfig;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;

/// Queue store configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis connection settings
    pub redis: RedisConfig,

    /// Optional prefix applied to every Redis key
    pub key_prefix: Option<String>,

    /// Key of the delayed-task sorted set
    pub scheduled_key: String,
}

impl QueueConfig {
    /// Create a new configuration.
    pub fn new(redis: RedisConfig) -> Self {
        Self {
            redis,
            key_prefix: None,
            scheduled_key: "scheduled_tasks".to_string(),
        }
    }

    /// Set a key prefix for namespacing all queue keys.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the key of the delayed-task sorted set.
    pub fn with_scheduled_key(mut self, key: impl Into<String>) -> Self {
        self.scheduled_key = key.into();
        self
    }

    /// Build a Redis key.
    fn key(&self, name: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, name),
            None => name.to_string(),
        }
    }

    fn scheduled_set_key(&self) -> String {
        self.key(&self.scheduled_key)
    }
}

/// Task queue backed by Redis.
///
/// Immediate queues are Redis lists (FIFO: producers `RPUSH` the tail, the
/// worker `BLPOP`s the head). Delayed tasks live in a sorted set scored by
/// their due Unix timestamp.
///
/// The store connection is owned by this instance; a worker should own its
/// own `TaskQueue`, since a blocking dequeue occupies the connection for up
/// to the full timeout.
#[derive(Clone)]
pub struct TaskQueue {
    connection: ConnectionManager,
    config: QueueConfig,
}

impl TaskQueue {
    /// Create a new task queue and verify the store is reachable.
    ///
    /// Failure to connect is fatal and propagated to the caller; this is the
    /// only error that should ever bring a worker process down.
    pub async fn new(redis: RedisConfig) -> QueueResult<Self> {
        Self::with_config(QueueConfig::new(redis)).await
    }

    /// Create a task queue with custom configuration.
    pub async fn with_config(config: QueueConfig) -> QueueResult<Self> {
        let client = Client::open(config.redis.connection_url())
            .map_err(|e| QueueError::Config(e.to_string()))?;

        let mut connection = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        info!("task queue connected to {}", config.redis.url);
        Ok(Self { connection, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a task to the tail of a queue.
    ///
    /// Constructs an envelope with a fresh identifier and current timestamp,
    /// serializes it, and appends it to `queue_name`.
    pub async fn enqueue(
        &self,
        queue_name: &str,
        task_type: impl Into<String>,
        data: TaskData,
    ) -> QueueResult<TaskId> {
        let task = Task::new(task_type, data);
        self.enqueue_task(queue_name, &task).await?;
        Ok(task.id)
    }

    /// Append a pre-built envelope to the tail of a queue.
    pub async fn enqueue_task(&self, queue_name: &str, task: &Task) -> QueueResult<()> {
        let task_json =
            serde_json::to_string(task).map_err(|e| QueueError::Serialization(e.to_string()))?;

        let mut conn = self.connection.clone();
        let key = self.config.key(queue_name);
        let _: () = conn.rpush(&key, task_json).await?;

        debug!("enqueued task {} (type: {}) on '{}'", task.id, task.task_type, queue_name);
        Ok(())
    }

    /// Remove and return the task at the head of a queue, blocking up to
    /// `timeout` for one to arrive.
    ///
    /// Returns `None` (not an error) if the timeout elapses with nothing
    /// available.
    pub async fn dequeue(&self, queue_name: &str, timeout: Duration) -> QueueResult<Option<Task>> {
        let mut conn = self.connection.clone();
        let key = self.config.key(queue_name);

        let result: Option<(String, String)> = conn.blpop(&key, timeout.as_secs_f64()).await?;

        let Some((_, task_json)) = result else {
            return Ok(None);
        };

        let task: Task = serde_json::from_str(&task_json)
            .map_err(|e| QueueError::Deserialization(e.to_string()))?;

        Ok(Some(task))
    }

    /// Schedule a task to be executed at a specific time.
    ///
    /// The envelope is inserted into the delayed set with its due Unix
    /// timestamp as the score. Entries sharing a score have no relative
    /// order.
    pub async fn schedule_task(
        &self,
        task_type: impl Into<String>,
        data: TaskData,
        execute_at: DateTime<Utc>,
    ) -> QueueResult<TaskId> {
        let task = Task::new(task_type, data);

        let task_json =
            serde_json::to_string(&task).map_err(|e| QueueError::Serialization(e.to_string()))?;

        let mut conn = self.connection.clone();
        let key = self.config.scheduled_set_key();
        let _: () = conn.zadd(&key, task_json, execute_at.timestamp()).await?;

        debug!(
            "scheduled task {} (type: {}) for {}",
            task.id, task.task_type, execute_at
        );
        Ok(task.id)
    }

    /// Return all scheduled tasks that are due, removing them from the
    /// delayed set.
    ///
    /// The removal is not atomic with the read: concurrent callers can
    /// observe overlapping due sets, so delivery of scheduled tasks is
    /// at-least-once. A single-worker deployment avoids the race by
    /// construction.
    ///
    /// Returns an empty list (not an error) when nothing is due. Corrupt
    /// members are logged and skipped.
    pub async fn get_due_scheduled_tasks(&self) -> QueueResult<Vec<Task>> {
        let mut conn = self.connection.clone();
        let key = self.config.scheduled_set_key();
        let now = Utc::now().timestamp();

        let members: Vec<String> = conn.zrangebyscore(&key, 0, now).await?;

        let mut tasks = Vec::with_capacity(members.len());
        for member in &members {
            match serde_json::from_str::<Task>(member) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!("skipping corrupt scheduled task: {}", e),
            }
        }

        if !members.is_empty() {
            let _: () = conn.zrembyscore(&key, 0, now).await?;
        }

        Ok(tasks)
    }

    /// Current number of tasks in a queue. Advisory only; not used for flow
    /// control.
    pub async fn queue_length(&self, queue_name: &str) -> QueueResult<u64> {
        let mut conn = self.connection.clone();
        let key = self.config.key(queue_name);
        let len: u64 = conn.llen(&key).await?;
        Ok(len)
    }

    /// Delete all tasks in a queue.
    pub async fn purge(&self, queue_name: &str) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let key = self.config.key(queue_name);
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    /// Delete the delayed set.
    pub async fn purge_scheduled(&self) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let key = self.config.scheduled_set_key();
        let _: () = conn.del(&key).await?;
        Ok(())
    }
}
