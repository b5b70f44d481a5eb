//! Queue Operation Tags
//!
//! Label values used for the per-kind queue counters. The set is closed so
//! every queue exports exactly three `type` series.

use kmeta_core::EventType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue operation kinds with controlled cardinality (3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueOp {
    Add,
    Update,
    Delete,
}

impl QueueOp {
    /// Every counted operation, in export order
    pub const ALL: [QueueOp; 3] = [QueueOp::Add, QueueOp::Update, QueueOp::Delete];

    /// Get string representation for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOp::Add => "Add",
            QueueOp::Update => "Update",
            QueueOp::Delete => "Delete",
        }
    }

    /// Map an event kind onto its counted operation, if it has one
    pub fn from_event_type(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::Added => Some(QueueOp::Add),
            EventType::Modified => Some(QueueOp::Update),
            EventType::Deleted => Some(QueueOp::Delete),
            EventType::Bookmark | EventType::Error => None,
        }
    }

    /// Position of the operation in [`QueueOp::ALL`]
    pub(crate) fn index(&self) -> usize {
        match self {
            QueueOp::Add => 0,
            QueueOp::Update => 1,
            QueueOp::Delete => 2,
        }
    }
}

impl fmt::Display for QueueOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
