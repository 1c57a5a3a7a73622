//! Worker implementation: the single-consumer dispatch loop.

use crate::error::{QueueError, QueueResult};
use crate::queue::TaskQueue;
use crate::task::{Task, TaskId};
use conveyor_log::{debug, error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Task handler function type.
pub type TaskHandler =
    Arc<dyn Fn(Task) -> Pin<Box<dyn Future<Output = QueueResult<()>> + Send>> + Send + Sync>;

/// A dropped task, reported through the failure sink.
#[derive(Debug)]
pub struct TaskFailure {
    /// Identifier of the dropped task
    pub task_id: TaskId,
    /// Type tag of the dropped task
    pub task_type: String,
    /// Why it was dropped
    pub error: QueueError,
}

/// Callback invoked for every task the worker drops.
pub type FailureSink = Arc<dyn Fn(TaskFailure) + Send + Sync>;

/// Mapping from task type to handler.
///
/// Populated before the worker starts; the dispatch loop works from a
/// snapshot, so later registrations are not seen by a running worker.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, TaskHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a handler with a task type.
    ///
    /// Registering twice for the same type silently overwrites; the last
    /// registration wins.
    pub fn register<F, Fut>(&mut self, task_type: impl Into<String>, handler: F)
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<()>> + Send + 'static,
    {
        let wrapped: TaskHandler = Arc::new(
            move |task: Task| -> Pin<Box<dyn Future<Output = QueueResult<()>> + Send>> {
                Box::pin(handler(task))
            },
        );
        self.handlers.insert(task_type.into(), wrapped);
    }

    /// Look up the handler for a task type.
    pub fn get(&self, task_type: &str) -> Option<TaskHandler> {
        self.handlers.get(task_type).cloned()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Shared cooperative-shutdown signal.
///
/// The loop observes it between iterations only, so shutdown latency is
/// bounded by the dequeue timeout plus one handler invocation.
#[derive(Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown.
    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    pub fn is_signaled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue the worker consumes
    pub queue_name: String,

    /// Bounded wait for each dequeue; also the promotion cadence when the
    /// queue is idle
    pub dequeue_timeout: Duration,

    /// Pause after a store error before retrying the loop
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: "default".to_string(),
            dequeue_timeout: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Create a configuration for the given queue.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..Default::default()
        }
    }

    /// Set the dequeue timeout.
    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    /// Set the store-error backoff.
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }
}

/// Worker that consumes tasks from a queue and dispatches them to
/// registered handlers.
///
/// One worker runs one loop: dequeue with a bounded wait, dispatch on
/// success, promote due scheduled tasks when the wait times out. Handler
/// invocation is synchronous within the loop; a slow handler stalls further
/// dequeuing until it returns. Tasks whose handler fails, and tasks with no
/// registered handler, are logged and dropped; there is no retry, requeue,
/// or dead-letter.
pub struct Worker {
    queue: TaskQueue,
    registry: HandlerRegistry,
    config: WorkerConfig,
    stop: StopSignal,
    failure_sink: Option<FailureSink>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Create a worker with default configuration.
    pub fn new(queue: TaskQueue) -> Self {
        Self::with_config(queue, WorkerConfig::default())
    }

    /// Create a worker with custom configuration.
    pub fn with_config(queue: TaskQueue, config: WorkerConfig) -> Self {
        Self {
            queue,
            registry: HandlerRegistry::new(),
            config,
            stop: StopSignal::new(),
            failure_sink: None,
            handle: None,
        }
    }

    /// Register a handler for a task type.
    ///
    /// Registration must happen before [`start`](Self::start); a running
    /// worker dispatches from a snapshot of the registry.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use conveyor_queue::{TaskQueue, Worker, QueueResult};
    /// use conveyor_redis::RedisConfig;
    ///
    /// # async fn example() -> QueueResult<()> {
    /// let queue = TaskQueue::new(RedisConfig::default()).await?;
    /// let mut worker = Worker::new(queue);
    ///
    /// worker.register_handler("send_email", |task| async move {
    ///     println!("sending email: {:?}", task.data);
    ///     Ok(())
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn register_handler<F, Fut>(&mut self, task_type: impl Into<String>, handler: F)
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<()>> + Send + 'static,
    {
        self.registry.register(task_type, handler);
    }

    /// Install a sink invoked for every dropped task.
    ///
    /// The sink observes unregistered types, handler failures, and failed
    /// promotions, alongside the logs. It never affects the loop's
    /// behavior.
    pub fn on_task_failure<F>(&mut self, sink: F)
    where
        F: Fn(TaskFailure) + Send + Sync + 'static,
    {
        self.failure_sink = Some(Arc::new(sink));
    }

    /// The registered handlers.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// A clone of the shutdown signal, for stopping the worker from another
    /// task while [`join`](Self::join)ing here.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Whether the dispatch loop is currently running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the dispatch loop.
    ///
    /// Idempotent: starting a running worker logs a warning and returns.
    pub async fn start(&mut self) -> QueueResult<()> {
        if self.is_running() {
            warn!("worker already running for queue '{}'", self.config.queue_name);
            return Ok(());
        }

        self.stop.reset();

        let queue = self.queue.clone();
        let registry = self.registry.clone();
        let stop = self.stop.clone();
        let config = self.config.clone();
        let sink = self.failure_sink.clone();

        self.handle = Some(tokio::spawn(run_loop(queue, registry, stop, config, sink)));

        info!("worker started for queue '{}'", self.config.queue_name);
        Ok(())
    }

    /// Request cooperative shutdown and wait for the loop to exit.
    ///
    /// An in-flight handler invocation is allowed to finish; there is no
    /// forced cancellation. Stopping an already-stopped worker is a no-op.
    pub async fn stop(&mut self) {
        self.stop.signal();
        if let Some(handle) = self.handle.take()
            && handle.await.is_err()
        {
            warn!("worker loop panicked during shutdown");
        }
    }

    /// Wait for the dispatch loop to finish.
    ///
    /// Intended for callers that request shutdown from elsewhere through a
    /// cloned [`StopSignal`].
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Stop the worker and release the underlying store connection.
    pub async fn close(mut self) {
        self.stop().await;
    }
}

async fn run_loop(
    queue: TaskQueue,
    registry: HandlerRegistry,
    stop: StopSignal,
    config: WorkerConfig,
    sink: Option<FailureSink>,
) {
    loop {
        if stop.is_signaled() {
            break;
        }

        match queue.dequeue(&config.queue_name, config.dequeue_timeout).await {
            Ok(Some(task)) => dispatch(&registry, &sink, task).await,
            Ok(None) => promote_scheduled(&queue, &config.queue_name, &sink).await,
            Err(e @ QueueError::Deserialization(_)) => {
                warn!("skipping corrupt task: {}", e);
            }
            Err(e) => {
                error!("error dequeuing task: {}", e);
                tokio::time::sleep(config.error_backoff).await;
            }
        }
    }

    info!("worker stopped for queue '{}'", config.queue_name);
}

async fn dispatch(registry: &HandlerRegistry, sink: &Option<FailureSink>, task: Task) {
    let Some(handler) = registry.get(&task.task_type) else {
        warn!("no handler registered for task type: {}", task.task_type);
        report_failure(
            sink,
            task.id,
            &task.task_type,
            QueueError::UnregisteredType(task.task_type.clone()),
        );
        return;
    };

    debug!("processing task {} (type: {})", task.id, task.task_type);

    let task_id = task.id;
    let task_type = task.task_type.clone();

    if let Err(e) = handler(task).await {
        error!("task {} failed: {}", task_id, e);
        report_failure(sink, task_id, &task_type, e);
    }
}

async fn promote_scheduled(queue: &TaskQueue, queue_name: &str, sink: &Option<FailureSink>) {
    let due = match queue.get_due_scheduled_tasks().await {
        Ok(tasks) => tasks,
        Err(e) => {
            error!("error fetching due scheduled tasks: {}", e);
            return;
        }
    };

    for task in due {
        debug!("promoting scheduled task {} (type: {})", task.id, task.task_type);

        if let Err(e) = queue
            .enqueue(queue_name, task.task_type.as_str(), task.data.clone())
            .await
        {
            error!("error promoting scheduled task {}: {}", task.id, e);
            report_failure(sink, task.id, &task.task_type, e);
        }
    }
}

fn report_failure(sink: &Option<FailureSink>, task_id: TaskId, task_type: &str, error: QueueError) {
    if let Some(sink) = sink {
        sink(TaskFailure {
            task_id,
            task_type: task_type.to_string(),
            error,
        });
    }
}
