//! Integration tests for conveyor-queue

use conveyor_queue::*;
use conveyor_redis::RedisConfig;
use serde_json::json;
use std::time::Duration;

fn payload(entries: &[(&str, serde_json::Value)]) -> TaskData {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_queue_config_creation() {
    let config = QueueConfig::new(RedisConfig::new("redis://localhost:6379"));
    assert_eq!(config.redis.url, "redis://localhost:6379");
    assert_eq!(config.scheduled_key, "scheduled_tasks");
}

#[test]
fn test_queue_config_builder() {
    let config = QueueConfig::new(RedisConfig::default())
        .with_key_prefix("testapp")
        .with_scheduled_key("delayed");

    assert_eq!(config.key_prefix.as_deref(), Some("testapp"));
    assert_eq!(config.scheduled_key, "delayed");
}

#[test]
fn test_task_creation() {
    let task = Task::new("send_email", payload(&[("to", json!("user@example.com"))]));

    assert_eq!(task.task_type, "send_email");
    assert_eq!(task.data["to"], json!("user@example.com"));
}

#[test]
fn test_queue_error_display() {
    let err = QueueError::UnregisteredType("unknown_x".to_string());
    assert!(format!("{}", err).contains("unknown_x"));
}

// The tests below require a Redis instance at localhost:6379.
// Run them with: cargo test -- --ignored

async fn test_queue(scheduled_key: &str) -> TaskQueue {
    let config = QueueConfig::new(RedisConfig::default()).with_scheduled_key(scheduled_key);
    TaskQueue::with_config(config).await.unwrap()
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_dequeue_round_trip() {
    let queue = test_queue("conveyor_test_sched_roundtrip").await;
    queue.purge("conveyor_test_roundtrip").await.unwrap();

    let data = payload(&[("to", json!("a@b.com")), ("count", json!(3))]);
    let task_id = queue
        .enqueue("conveyor_test_roundtrip", "email_notification", data.clone())
        .await
        .unwrap();

    let task = queue
        .dequeue("conveyor_test_roundtrip", Duration::from_secs(1))
        .await
        .unwrap()
        .expect("expected a task");

    assert_eq!(task.id, task_id);
    assert_eq!(task.task_type, "email_notification");
    assert_eq!(task.data, data);

    // Consumed: the queue is empty again
    assert_eq!(queue.queue_length("conveyor_test_roundtrip").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dequeue_timeout_returns_none() {
    let queue = test_queue("conveyor_test_sched_timeout").await;
    queue.purge("conveyor_test_empty").await.unwrap();

    let result = queue
        .dequeue("conveyor_test_empty", Duration::from_secs(1))
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_fifo_order() {
    let queue = test_queue("conveyor_test_sched_fifo").await;
    queue.purge("conveyor_test_fifo").await.unwrap();

    queue
        .enqueue("conveyor_test_fifo", "step", payload(&[("seq", json!("a"))]))
        .await
        .unwrap();
    queue
        .enqueue("conveyor_test_fifo", "step", payload(&[("seq", json!("b"))]))
        .await
        .unwrap();

    let first = queue
        .dequeue("conveyor_test_fifo", Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();
    let second = queue
        .dequeue("conveyor_test_fifo", Duration::from_secs(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.data["seq"], json!("a"));
    assert_eq!(second.data["seq"], json!("b"));
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_scheduled_task_due_boundary() {
    let queue = test_queue("conveyor_test_sched_boundary").await;
    queue.purge_scheduled().await.unwrap();

    // Not yet due: must not be returned
    queue
        .schedule_task(
            "reminder",
            payload(&[("n", json!(1))]),
            chrono::Utc::now() + chrono::Duration::seconds(60),
        )
        .await
        .unwrap();

    let due = queue.get_due_scheduled_tasks().await.unwrap();
    assert!(due.is_empty());

    // Already due: returned exactly once under single-caller access
    queue
        .schedule_task(
            "reminder",
            payload(&[("n", json!(2))]),
            chrono::Utc::now() - chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

    let due = queue.get_due_scheduled_tasks().await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].data["n"], json!(2));

    let due_again = queue.get_due_scheduled_tasks().await.unwrap();
    assert!(due_again.is_empty());

    queue.purge_scheduled().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_unregistered_type_dropped() {
    let queue = test_queue("conveyor_test_sched_unreg").await;
    queue.purge("conveyor_test_unreg").await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut worker = Worker::with_config(
        queue.clone(),
        WorkerConfig::new("conveyor_test_unreg").with_dequeue_timeout(Duration::from_secs(1)),
    );
    worker.on_task_failure(move |failure| {
        tx.send(failure).unwrap();
    });

    queue
        .enqueue("conveyor_test_unreg", "unknown_x", TaskData::new())
        .await
        .unwrap();

    worker.start().await.unwrap();

    let failure = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("expected the dropped task to be reported")
        .unwrap();

    assert_eq!(failure.task_type, "unknown_x");
    assert!(matches!(failure.error, QueueError::UnregisteredType(_)));

    // The loop survived and the task did not reappear
    assert!(worker.is_running());
    assert_eq!(queue.queue_length("conveyor_test_unreg").await.unwrap(), 0);

    worker.stop().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_end_to_end_scheduled_delivery() {
    let queue = test_queue("conveyor_test_sched_e2e").await;
    queue.purge("conveyor_test_e2e").await.unwrap();
    queue.purge_scheduled().await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut worker = Worker::with_config(
        queue.clone(),
        WorkerConfig::new("conveyor_test_e2e").with_dequeue_timeout(Duration::from_secs(1)),
    );
    worker.register_handler("email_notification", move |task| {
        let tx = tx.clone();
        async move {
            tx.send(task.data).unwrap();
            Ok(())
        }
    });

    queue
        .schedule_task(
            "email_notification",
            payload(&[("to", json!("a@b.com"))]),
            chrono::Utc::now() + chrono::Duration::seconds(2),
        )
        .await
        .unwrap();

    worker.start().await.unwrap();

    // Promotion happens on dequeue timeout (1s), so the handler should run
    // within roughly a second of the due time
    let data = tokio::time::timeout(Duration::from_secs(4), rx.recv())
        .await
        .expect("handler was not invoked in time")
        .unwrap();

    assert_eq!(data["to"], json!("a@b.com"));

    worker.stop().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_stop_is_idempotent() {
    let queue = test_queue("conveyor_test_sched_stop").await;

    let mut worker = Worker::with_config(
        queue,
        WorkerConfig::new("conveyor_test_stop").with_dequeue_timeout(Duration::from_secs(1)),
    );

    // Stopping a never-started worker is a no-op
    worker.stop().await;
    assert!(!worker.is_running());

    worker.start().await.unwrap();
    assert!(worker.is_running());

    worker.stop().await;
    assert!(!worker.is_running());

    // Stopping again is a no-op, not an error
    worker.stop().await;
    assert!(!worker.is_running());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_start_is_idempotent() {
    let queue = test_queue("conveyor_test_sched_start").await;

    let mut worker = Worker::with_config(
        queue,
        WorkerConfig::new("conveyor_test_start").with_dequeue_timeout(Duration::from_secs(1)),
    );

    worker.start().await.unwrap();
    worker.start().await.unwrap();
    assert!(worker.is_running());

    worker.stop().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_concurrent_due_fetch_may_duplicate() {
    // Documents the known hazard: the due-set read and its removal are not
    // atomic, so two concurrent callers may BOTH observe the same entry.
    // This asserts duplicates are possible (not guaranteed), never that
    // delivery is exactly-once under concurrency.
    let queue = test_queue("conveyor_test_sched_race").await;
    queue.purge_scheduled().await.unwrap();

    queue
        .schedule_task(
            "reminder",
            payload(&[("n", json!(1))]),
            chrono::Utc::now() - chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

    let a = queue.clone();
    let b = queue.clone();
    let (ra, rb) = tokio::join!(a.get_due_scheduled_tasks(), b.get_due_scheduled_tasks());

    let seen = ra.unwrap().len() + rb.unwrap().len();
    assert!((1..=2).contains(&seen), "entry seen {} times", seen);

    queue.purge_scheduled().await.unwrap();
}
