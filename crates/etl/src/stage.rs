//! The per-worker stage contract and the shared poll loop.

use std::time::Duration;

use async_trait::async_trait;

use jobrail_gateway::{Gateway, GatewayError};

use crate::error::EtlError;

/// How long one poll waits before giving the loop a turn.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One stage of the pipeline, run to completion by the supervisor.
///
/// `setup` registers subscriptions and connects stores; `run_loop`
/// blocks until the gateway closes or a fatal error surfaces;
/// `teardown` drains in-flight work and closes the gateway. The
/// supervisor guarantees teardown runs on both signal and error paths.
#[async_trait]
pub trait StageWorker: Send + Sync {
    fn name(&self) -> &str;

    async fn setup(&self) -> Result<(), EtlError>;

    async fn run_loop(&self) -> Result<(), EtlError>;

    async fn teardown(&self) -> Result<(), EtlError>;
}

/// The poll → dispatch → emit loop every stage runs.
///
/// A `Closed` error from poll means teardown closed the gateway under
/// us; that is the clean exit, not a failure.
pub async fn poll_loop(gateway: &Gateway) -> Result<(), EtlError> {
    while !gateway.is_closed() {
        match gateway.poll(POLL_INTERVAL).await {
            Ok(()) => {}
            Err(GatewayError::Closed) => break,
            Err(err) => return Err(err.into()),
        }
        gateway.emit().await;
    }
    Ok(())
}
