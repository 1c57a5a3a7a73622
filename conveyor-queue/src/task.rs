//! Task envelope definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task unique identifier.
pub type TaskId = Uuid;

/// Task payload: a string-keyed mapping of JSON values, opaque to the queue
/// and interpreted only by the handler.
pub type TaskData = serde_json::Map<String, serde_json::Value>;

/// The serialized unit of work.
///
/// An envelope is immutable after creation; once stored it is never mutated
/// in place. Wire format is a JSON object:
///
/// ```json
/// {"id": "...", "type": "...", "data": {...}, "created_at": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, generated at enqueue time, never reused
    pub id: TaskId,

    /// Type tag selecting a handler; unknown types are legal but
    /// undispatchable
    #[serde(rename = "type")]
    pub task_type: String,

    /// Opaque payload
    pub data: TaskData,

    /// When the envelope was created; diagnostics only, not used for
    /// ordering
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new envelope with a fresh identifier and current timestamp.
    pub fn new(task_type: impl Into<String>, data: TaskData) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            data,
            created_at: Utc::now(),
        }
    }
}
