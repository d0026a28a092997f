//! Message contracts for the pipeline.
//!
//! A codec binds a topic name to a typed message and its wire form.
//! All five wire forms are UTF-8 JSON; compressed text fields travel as
//! base64 of the zlib-compressed UTF-8 bytes, timestamps as ISO-8601
//! strings, and absent values as explicit JSON nulls.

use thiserror::Error;

pub mod compress;

mod detail_extract;
mod detail_page;
mod enriched_job;
mod listing_extract;
mod listing_page;

pub use detail_extract::{DetailExtractCmd, DetailExtractCodec};
pub use detail_page::{DetailPage, DetailPageCodec};
pub use enriched_job::{EnrichedJob, EnrichedJobCodec, InvalidRecord};
pub use listing_extract::{ListingExtractCmd, ListingExtractCodec};
pub use listing_page::{ListingPage, ListingPageCodec};

/// Action verbs carried on the wire. A record whose action is not the
/// one its stage expects is a dead letter, not a protocol error.
pub mod actions {
    pub const START_EXTRACT: &str = "START_EXTRACT";
    pub const START_TRANSFORM: &str = "START_TRANSFORM";
    pub const START_LOAD: &str = "START_LOAD";
}

/// Errors produced while encoding or decoding a wire message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid zlib payload: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// The (topic, serialize, deserialize) bundle binding wire bytes to a
/// message type. Implementations are stateless marker types.
pub trait Codec: Send + Sync + 'static {
    type Message: Send + 'static;

    /// Topic this codec's messages travel on.
    const TOPIC: &'static str;

    fn serialize(message: &Self::Message) -> Result<Vec<u8>, CodecError>;

    fn deserialize(bytes: &[u8]) -> Result<Self::Message, CodecError>;
}
