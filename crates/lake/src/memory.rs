//! In-memory lake used by tests and single-process development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use jobrail_codec::EnrichedJob;

use crate::error::LakeError;
use crate::model::{Posting, PostingTriple, RawPageDoc};
use crate::traits::{EnrichedStore, PostingStore, RawPageStore};

/// One in-process document store implementing all three repositories.
#[derive(Default)]
pub struct MemoryLake {
    raw_pages: Mutex<Vec<RawPageDoc>>,
    postings: Mutex<Vec<Posting>>,
    enriched: Mutex<HashMap<String, EnrichedJob>>,
}

impl MemoryLake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_page_count(&self) -> usize {
        self.raw_pages.lock().unwrap().len()
    }

    pub fn raw_page(&self, index: usize) -> Option<RawPageDoc> {
        self.raw_pages.lock().unwrap().get(index).cloned()
    }

    pub fn posting_by_job_id(&self, job_id: i64) -> Option<Posting> {
        self.postings
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.job_id == Some(job_id))
            .cloned()
    }

    pub fn posting_by_url(&self, url: &str) -> Option<Posting> {
        self.postings
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.url == url)
            .cloned()
    }

    pub fn posting_count(&self) -> usize {
        self.postings.lock().unwrap().len()
    }

    pub fn enriched_by_url(&self, url: &str) -> Option<EnrichedJob> {
        self.enriched.lock().unwrap().get(url).cloned()
    }

    pub fn enriched_count(&self) -> usize {
        self.enriched.lock().unwrap().len()
    }
}

#[async_trait]
impl RawPageStore for MemoryLake {
    async fn insert(&self, url: &str, html: &str) -> Result<String, LakeError> {
        let doc = RawPageDoc::new(url, html, Utc::now())?;
        let mut raw_pages = self.raw_pages.lock().unwrap();
        raw_pages.push(doc);
        Ok(format!("raw-{}", raw_pages.len() - 1))
    }
}

#[async_trait]
impl PostingStore for MemoryLake {
    async fn upsert_many(&self, triples: &[PostingTriple]) -> Result<Vec<usize>, LakeError> {
        let mut postings = self.postings.lock().unwrap();
        let mut inserted = Vec::new();
        for (index, triple) in triples.iter().enumerate() {
            match postings
                .iter_mut()
                .find(|p| p.job_id == Some(triple.job_id))
            {
                Some(existing) => {
                    existing.role = Some(triple.role.clone());
                    existing.url = triple.url.clone();
                }
                None => {
                    postings.push(Posting {
                        created_at: Utc::now(),
                        job_id: Some(triple.job_id),
                        role: Some(triple.role.clone()),
                        url: triple.url.clone(),
                        e2_success: None,
                    });
                    inserted.push(index);
                }
            }
        }
        Ok(inserted)
    }

    async fn set_e2_success(&self, url: &str, success: bool) -> Result<(), LakeError> {
        let mut postings = self.postings.lock().unwrap();
        match postings.iter_mut().find(|p| p.url == url) {
            Some(existing) => existing.e2_success = Some(success),
            None => postings.push(Posting {
                created_at: Utc::now(),
                job_id: None,
                role: None,
                url: url.to_string(),
                e2_success: Some(success),
            }),
        }
        Ok(())
    }
}

#[async_trait]
impl EnrichedStore for MemoryLake {
    async fn upsert(&self, record: &EnrichedJob) -> Result<(), LakeError> {
        record.validate()?;
        self.enriched
            .lock()
            .unwrap()
            .insert(record.url.clone(), record.clone());
        Ok(())
    }
}
