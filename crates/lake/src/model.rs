use chrono::{DateTime, Utc};

use jobrail_codec::compress;

use crate::error::LakeError;

pub const SOURCE: &str = "handshake";

/// One stored raw page: the HTML zlib-compressed, plus enough metadata
/// to replay it later.
#[derive(Debug, Clone)]
pub struct RawPageDoc {
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub codec: String,
    pub payload: Vec<u8>,
}

impl RawPageDoc {
    pub fn new(url: &str, html: &str, created_at: DateTime<Utc>) -> Result<Self, LakeError> {
        Ok(Self {
            source: SOURCE.to_string(),
            created_at,
            url: url.to_string(),
            codec: "zlib".to_string(),
            payload: compress::deflate(html)?,
        })
    }

    /// Decompress the stored payload back to the original HTML.
    pub fn html(&self) -> Result<String, LakeError> {
        Ok(compress::inflate(&self.payload)?)
    }
}

/// The (job_id, role, url) triple the listing transformer discovers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingTriple {
    pub job_id: i64,
    pub role: String,
    pub url: String,
}

impl PostingTriple {
    pub fn new(job_id: i64, role: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            job_id,
            role: role.into(),
            url: url.into(),
        }
    }
}

/// One job-posting document.
///
/// `job_id` is the usual key; `set_e2_success` upserts by url, so a
/// document created that way has no job_id until the listing pass
/// sees it.
#[derive(Debug, Clone)]
pub struct Posting {
    pub created_at: DateTime<Utc>,
    pub job_id: Option<i64>,
    pub role: Option<String>,
    pub url: String,
    pub e2_success: Option<bool>,
}
