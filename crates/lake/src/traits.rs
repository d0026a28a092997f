use async_trait::async_trait;

use jobrail_codec::EnrichedJob;

use crate::error::LakeError;
use crate::model::PostingTriple;

/// Append-only store for raw listing pages.
#[async_trait]
pub trait RawPageStore: Send + Sync {
    /// Compress and store one page; returns the new document's id.
    async fn insert(&self, url: &str, html: &str) -> Result<String, LakeError>;
}

/// Upsert store for job postings.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Bulk upsert keyed by job_id, unordered. On insert, `created_at`
    /// and `job_id` are set once; `role` and `url` are always set.
    /// Returns the indices of triples that were newly inserted, not
    /// merely updated: the pipeline's idempotence lever.
    async fn upsert_many(&self, triples: &[PostingTriple]) -> Result<Vec<usize>, LakeError>;

    /// Record the detail-fetch outcome for a posting, upserting by url.
    async fn set_e2_success(&self, url: &str, success: bool) -> Result<(), LakeError>;
}

/// Validate-then-upsert store for enriched job records, keyed by url.
#[async_trait]
pub trait EnrichedStore: Send + Sync {
    async fn upsert(&self, record: &EnrichedJob) -> Result<(), LakeError>;
}
