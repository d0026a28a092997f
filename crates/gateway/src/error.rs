use thiserror::Error;

use jobrail_codec::CodecError;

/// Errors surfaced by the gateway and its log backends.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("producer is not configured")]
    NoProducer,

    #[error("consumer is not configured")]
    NoConsumer,

    #[error("gateway is closed")]
    Closed,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("listener error: {0}")]
    Listener(String),
}

impl GatewayError {
    /// Wrap a stage-level failure so it can propagate out of a notify
    /// callback. The gateway never swallows these.
    pub fn listener(err: impl std::fmt::Display) -> Self {
        Self::Listener(err.to_string())
    }
}
