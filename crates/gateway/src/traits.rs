use std::time::Duration;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::record::{Delivery, Record};

/// Identifies one enqueued record until its delivery report arrives.
pub type Ticket = u64;

/// Write side of the message log.
///
/// `enqueue` never waits for the broker; delivery outcomes surface later
/// through [`LogProducer::drain_reports`], keyed by ticket.
#[async_trait]
pub trait LogProducer: Send + Sync {
    /// Enqueue one record for asynchronous transmission.
    async fn enqueue(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<Ticket, GatewayError>;

    /// Collect delivery reports without blocking.
    async fn drain_reports(&self) -> Vec<(Ticket, Result<Delivery, GatewayError>)>;

    /// Wait up to `timeout` for in-flight records to be delivered.
    /// Returns how many are still undelivered (lost on close).
    async fn flush(&self, timeout: Duration) -> usize;
}

/// Read side of the message log.
#[async_trait]
pub trait LogConsumer: Send + Sync {
    /// Replace the subscription set with the given topics.
    async fn subscribe(&self, topics: &[String]) -> Result<(), GatewayError>;

    /// Wait up to `timeout` for one record. `None` on timeout.
    async fn poll(&self, timeout: Duration) -> Result<Option<Record>, GatewayError>;

    /// Release broker-side resources. Safe to call more than once.
    async fn close(&self);
}
