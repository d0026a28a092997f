//! Per-process facade over the message log.
//!
//! The log itself is external: a partitioned, append-only, at-least-once
//! pub/sub system reached through the [`LogProducer`] / [`LogConsumer`]
//! traits. [`Gateway`] owns zero-or-one of each and routes every polled
//! record through a fixed table of (codec, notify) listeners.
//!
//! [`MemoryLog`] is the in-process backend used by tests and
//! single-process development; the `kafka` feature provides the
//! production client.

mod error;
mod gateway;
mod memory;
mod record;
mod traits;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use error::GatewayError;
pub use gateway::{DeliveryCallback, Gateway, Subscription};
pub use memory::{MemoryConsumer, MemoryLog, MemoryProducer};
pub use record::{pipeline_topics, Delivery, Record, TopicSpec};
pub use traits::{LogConsumer, LogProducer, Ticket};
