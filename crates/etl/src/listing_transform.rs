//! Listing transformer: turns a raw search-result page into detail
//! extract commands, one per posting the store has not seen before.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use jobrail_codec::{
    actions, DetailExtractCmd, DetailExtractCodec, ListingPage, ListingPageCodec,
};
use jobrail_gateway::{Gateway, GatewayError, Subscription};
use jobrail_lake::{PostingStore, PostingTriple};

use crate::error::EtlError;
use crate::html::Document;
use crate::stage::{poll_loop, StageWorker};

const JOB_URL_BASE: &str = "https://app.joinhandshake.com/jobs";

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"job-search/(\d+)").unwrap())
}

/// One job-card anchor lifted from the listing page.
#[derive(Debug, PartialEq, Eq)]
pub struct JobCard {
    pub href: String,
    pub label: String,
}

/// Pull every `a[role="button"]` under `main` as a (href, aria-label)
/// pair.
pub fn job_cards(html: &str) -> Vec<JobCard> {
    let doc = Document::parse(html);
    doc.find_all(|el| {
        el.tag() == "a" && el.attr("role") == Some("button") && el.has_ancestor_tag("main")
    })
    .into_iter()
    .filter_map(|el| {
        Some(JobCard {
            href: el.attr("href")?.to_string(),
            label: el.attr("aria-label")?.to_string(),
        })
    })
    .collect()
}

pub struct ListingTransformer {
    gateway: Arc<Gateway>,
    postings: Arc<dyn PostingStore>,
    dead_letters: AtomicU64,
}

impl ListingTransformer {
    pub fn new(gateway: Arc<Gateway>, postings: Arc<dyn PostingStore>) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            postings,
            dead_letters: AtomicU64::new(0),
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn dead_letter_count(&self) -> u64 {
        self.dead_letters.load(Ordering::SeqCst)
    }

    pub fn subscription(self: &Arc<Self>) -> Subscription {
        let stage = self.clone();
        Subscription::on_topic::<ListingPageCodec, _, _>(move |page: ListingPage| {
            let stage = stage.clone();
            async move { stage.on_notify(page).await }
        })
    }

    async fn on_notify(&self, page: ListingPage) -> Result<(), GatewayError> {
        match page.action.as_str() {
            actions::START_TRANSFORM => self
                .transform(&page.html)
                .await
                .map_err(GatewayError::listener),
            other => {
                self.dead_letters.fetch_add(1, Ordering::SeqCst);
                warn!(action = other, "unrecognized action, dead-lettered");
                Ok(())
            }
        }
    }

    fn derive_job_id(href: &str) -> Option<i64> {
        job_id_pattern()
            .captures(href)
            .and_then(|captures| captures[1].parse().ok())
    }

    fn clean_role(label: &str) -> &str {
        label.strip_prefix("View ").unwrap_or(label)
    }

    /// Canonical triples from the page, in card order. Cards whose href
    /// carries no job id are skipped without aborting the batch.
    pub fn triples(html: &str) -> Vec<PostingTriple> {
        job_cards(html)
            .into_iter()
            .filter_map(|card| {
                let Some(job_id) = Self::derive_job_id(&card.href) else {
                    debug!(href = %card.href, "card without a job id, skipped");
                    return None;
                };
                Some(PostingTriple::new(
                    job_id,
                    Self::clean_role(&card.label),
                    format!("{JOB_URL_BASE}/{job_id}"),
                ))
            })
            .collect()
    }

    /// Upsert every discovered posting; dispatch detail commands for
    /// the newly inserted ones only.
    pub async fn transform(&self, html: &str) -> Result<(), EtlError> {
        let triples = Self::triples(html);
        if triples.is_empty() {
            debug!("listing page yielded no job cards");
            return Ok(());
        }
        let inserted = self.postings.upsert_many(&triples).await?;
        info!(
            discovered = triples.len(),
            new = inserted.len(),
            "listing page processed"
        );
        for index in inserted {
            let triple = &triples[index];
            let cmd = DetailExtractCmd::new(triple.job_id, triple.role.clone(), triple.url.clone());
            self.gateway
                .send::<DetailExtractCodec>(&cmd, None, None)
                .await?;
        }
        Ok(())
    }
}

/// [`StageWorker`] wrapper for the listing transformer.
pub struct ListingTransformWorker {
    stage: Arc<ListingTransformer>,
}

impl ListingTransformWorker {
    pub fn new(stage: Arc<ListingTransformer>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl StageWorker for ListingTransformWorker {
    fn name(&self) -> &str {
        "listing-transform"
    }

    async fn setup(&self) -> Result<(), EtlError> {
        self.stage
            .gateway()
            .set_consumers(vec![self.stage.subscription()])
            .await?;
        Ok(())
    }

    async fn run_loop(&self) -> Result<(), EtlError> {
        poll_loop(self.stage.gateway()).await
    }

    async fn teardown(&self) -> Result<(), EtlError> {
        self.stage.gateway().close().await;
        Ok(())
    }
}
