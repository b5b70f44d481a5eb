//! Work items flowing through the broker queue
//!
//! Collectors turn watch notifications into [`ResourceEvent`]s and push them
//! through the broker. The broker only needs two things from an event: the
//! kind of change it describes and a hashable key that identifies it while it
//! is in flight. Both are captured by the [`Event`] trait.

use crate::error::{EventKeyError, EventKeyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Maximum length of a resource uid
pub const MAX_UID_LENGTH: usize = 128;

/// Kind of change carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A resource was created
    Added,
    /// A resource was updated
    Modified,
    /// A resource was removed
    Deleted,
    /// Watch progress marker, carries no resource change
    Bookmark,
    /// Watch stream error forwarded by a collector
    Error,
}

impl EventType {
    /// Get string representation for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Added => "added",
            EventType::Modified => "modified",
            EventType::Deleted => "deleted",
            EventType::Bookmark => "bookmark",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of queue traffic
///
/// The key must identify the event for as long as it sits in a queue. Two
/// events with equal keys are treated as the same work item.
pub trait Event {
    /// Correlation key for the event
    type Key: Eq + Hash + Clone;

    /// Kind of change the event carries
    fn event_type(&self) -> EventType;

    /// Key identifying this event while it is in flight
    fn key(&self) -> Self::Key;
}

impl<E: Event + ?Sized> Event for &E {
    type Key = E::Key;

    fn event_type(&self) -> EventType {
        (**self).event_type()
    }

    fn key(&self) -> Self::Key {
        (**self).key()
    }
}

/// Identity of a resource event: the resource uid plus the resource version
/// the event was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    uid: String,
    resource_version: u64,
}

impl EventKey {
    /// Parse and validate an event key
    pub fn parse(uid: impl AsRef<str>, resource_version: u64) -> EventKeyResult<Self> {
        let uid = uid.as_ref();
        if uid.is_empty() {
            return Err(EventKeyError::EmptyUid);
        }
        if uid.trim() != uid {
            return Err(EventKeyError::Whitespace(uid.to_string()));
        }
        if uid.len() > MAX_UID_LENGTH {
            return Err(EventKeyError::TooLong {
                length: uid.len(),
                max: MAX_UID_LENGTH,
            });
        }

        Ok(Self {
            uid: uid.to_string(),
            resource_version,
        })
    }

    /// Generate a key with a random uid at version zero
    pub fn generate() -> Self {
        Self {
            uid: uuid::Uuid::new_v4().to_string(),
            resource_version: 0,
        }
    }

    /// Resource uid
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Resource version the event refers to
    pub fn resource_version(&self) -> u64 {
        self.resource_version
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.uid, self.resource_version)
    }
}

/// Event describing a change to a watched resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceEvent {
    key: EventKey,
    event_type: EventType,
}

impl ResourceEvent {
    /// Create a new resource event
    pub fn new(key: EventKey, event_type: EventType) -> Self {
        Self { key, event_type }
    }

    /// Event for a created resource
    pub fn added(key: EventKey) -> Self {
        Self::new(key, EventType::Added)
    }

    /// Event for an updated resource
    pub fn modified(key: EventKey) -> Self {
        Self::new(key, EventType::Modified)
    }

    /// Event for a removed resource
    pub fn deleted(key: EventKey) -> Self {
        Self::new(key, EventType::Deleted)
    }

    /// Borrow the event key
    pub fn event_key(&self) -> &EventKey {
        &self.key
    }
}

impl Event for ResourceEvent {
    type Key = EventKey;

    fn event_type(&self) -> EventType {
        self.event_type
    }

    fn key(&self) -> EventKey {
        self.key.clone()
    }
}
