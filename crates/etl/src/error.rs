use thiserror::Error;

use jobrail_fetch::FetchError;
use jobrail_gateway::GatewayError;
use jobrail_lake::LakeError;

/// Errors surfaced by the stage workers and their supervisor.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Lake(#[from] LakeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to spawn worker process: {0}")]
    Spawn(#[from] std::io::Error),
}
