//! # kmeta Core
//!
//! Event model shared by the kmeta broker crates: the operation kinds a
//! collector emits and the work-item contract the broker queue relies on.

pub mod error;
pub mod event;

pub use error::{EventKeyError, EventKeyResult};
pub use event::{Event, EventKey, EventType, ResourceEvent};
