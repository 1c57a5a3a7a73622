//! Redis-backed task queue and worker for Conveyor.
//!
//! Provides a background task system with:
//! - 📦 Redis-backed FIFO queues (one list per queue name)
//! - ⏰ Delayed/scheduled tasks promoted from a time-scored set
//! - 👷 A single-consumer worker loop with type-keyed handlers
//! - 🔍 An injectable failure sink for observing dropped tasks
//!
//! Delivery is best-effort, at-most-once-attempt: a task whose handler
//! fails, or whose type has no registered handler, is logged and dropped.
//! Scheduled tasks are delivered at-least-once under concurrent promotion.
//!
//! ## Quick Start - Task Envelopes
//!
//! ```
//! use conveyor_queue::{Task, TaskData};
//! use serde_json::json;
//!
//! let mut data = TaskData::new();
//! data.insert("to".into(), json!("user@example.com"));
//!
//! let task = Task::new("email_notification", data);
//!
//! assert_eq!(task.task_type, "email_notification");
//! assert_eq!(task.data["to"], json!("user@example.com"));
//! ```
//!
//! ## Worker Configuration
//!
//! ```
//! use conveyor_queue::WorkerConfig;
//! use std::time::Duration;
//!
//! let config = WorkerConfig::new("emails")
//!     .with_dequeue_timeout(Duration::from_secs(1));
//!
//! assert_eq!(config.queue_name, "emails");
//! assert_eq!(config.dequeue_timeout, Duration::from_secs(1));
//! ```
//!
//! ## Complete Example
//!
//! ```no_run
//! use conveyor_queue::*;
//! use conveyor_redis::RedisConfig;
//!
//! #[tokio::main]
//! async fn main() -> QueueResult<()> {
//!     let queue = TaskQueue::new(RedisConfig::new("redis://localhost:6379")).await?;
//!
//!     // Producers enqueue and return immediately
//!     let mut data = TaskData::new();
//!     data.insert("to".into(), serde_json::json!("user@example.com"));
//!     let _task_id = queue.enqueue("default", "send_email", data).await?;
//!
//!     // The worker owns its own queue handle and dispatches by task type
//!     let mut worker = Worker::new(queue);
//!     worker.register_handler("send_email", |_task| async move {
//!         // send the email
//!         Ok(())
//!     });
//!     worker.start().await?;
//!
//!     // ... later
//!     worker.stop().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod queue;
pub mod task;
pub mod worker;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, TaskQueue};
pub use task::{Task, TaskData, TaskId};
pub use worker::{
    FailureSink, HandlerRegistry, StopSignal, TaskFailure, TaskHandler, Worker, WorkerConfig,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::queue::{QueueConfig, TaskQueue};
    pub use crate::task::{Task, TaskData, TaskId};
    pub use crate::worker::{
        FailureSink, HandlerRegistry, StopSignal, TaskFailure, TaskHandler, Worker, WorkerConfig,
    };
}
