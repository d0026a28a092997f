use thiserror::Error;

use jobrail_codec::{CodecError, InvalidRecord};

/// Errors surfaced by the document-store repositories.
#[derive(Debug, Error)]
pub enum LakeError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Schema rejection of an enriched record. Fatal for the message
    /// that carried it.
    #[error("invalid record: {0}")]
    Validation(#[from] InvalidRecord),

    #[error(transparent)]
    Compress(#[from] CodecError),
}
