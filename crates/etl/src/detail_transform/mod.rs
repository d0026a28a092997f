//! Detail transformer: raw per-job page → canonical enriched record.
//!
//! Pipeline per message: anchored parse → cleaning rules → validate →
//! upsert → publish. A record the schema rejects is fatal for that
//! message only: logged, dropped, the stage keeps running.

pub mod clean;
pub mod raw;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use jobrail_codec::{actions, DetailPage, DetailPageCodec, EnrichedJobCodec};
use jobrail_gateway::{Gateway, GatewayError, Subscription};
use jobrail_lake::{EnrichedStore, LakeError};

use crate::error::EtlError;
use crate::stage::{poll_loop, StageWorker};

pub use clean::enrich;
pub use raw::RawJobPage;

pub struct DetailTransformer {
    gateway: Arc<Gateway>,
    enriched: Arc<dyn EnrichedStore>,
    dead_letters: AtomicU64,
    rejected: AtomicU64,
}

impl DetailTransformer {
    pub fn new(gateway: Arc<Gateway>, enriched: Arc<dyn EnrichedStore>) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            enriched,
            dead_letters: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn dead_letter_count(&self) -> u64 {
        self.dead_letters.load(Ordering::SeqCst)
    }

    /// Records dropped by schema validation.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn subscription(self: &Arc<Self>) -> Subscription {
        let stage = self.clone();
        Subscription::on_topic::<DetailPageCodec, _, _>(move |page: DetailPage| {
            let stage = stage.clone();
            async move { stage.on_notify(page).await }
        })
    }

    async fn on_notify(&self, page: DetailPage) -> Result<(), GatewayError> {
        match page.action.as_str() {
            actions::START_TRANSFORM => self
                .transform(&page.url, &page.html, page.created_at)
                .await
                .map_err(GatewayError::listener),
            other => {
                self.dead_letters.fetch_add(1, Ordering::SeqCst);
                warn!(action = other, "unrecognized action, dead-lettered");
                Ok(())
            }
        }
    }

    /// Parse, clean, validate, upsert, publish.
    pub async fn transform(
        &self,
        url: &str,
        html: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<(), EtlError> {
        let raw = RawJobPage::parse(html);
        let record = enrich(&raw, url, scraped_at);
        match self.enriched.upsert(&record).await {
            Ok(()) => {}
            Err(LakeError::Validation(err)) => {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                error!(url, error = %err, "enriched record rejected, dropped");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        self.gateway
            .send::<EnrichedJobCodec>(&record, None, None)
            .await?;
        info!(url, "enriched record published");
        Ok(())
    }
}

/// [`StageWorker`] wrapper for the detail transformer.
pub struct DetailTransformWorker {
    stage: Arc<DetailTransformer>,
}

impl DetailTransformWorker {
    pub fn new(stage: Arc<DetailTransformer>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl StageWorker for DetailTransformWorker {
    fn name(&self) -> &str {
        "detail-transform"
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
