// Conveyor - a Redis-backed background task queue and worker for Rust
//
// This library provides a FIFO task queue with delayed/scheduled execution
// and a single-consumer dispatcher that routes tasks to type-keyed handlers.

// Re-export optional crates
#[cfg(feature = "queue")]
pub use conveyor_queue;

#[cfg(feature = "redis")]
pub use conveyor_redis;

// Prelude for common imports
#[cfg(feature = "queue")]
pub mod prelude {
    pub use conveyor_queue::{
        HandlerRegistry,
        QueueConfig,
        QueueError,
        QueueResult,
        Task,
        TaskData,
        TaskFailure,
        TaskHandler,
        TaskId,
        TaskQueue,
        Worker,
        WorkerConfig,
    };

    #[cfg(feature = "redis")]
    pub use conveyor_redis::{RedisConfig, RedisService};
}
