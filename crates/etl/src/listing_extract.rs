//! Listing extractor: fetches search-result pages and feeds the
//! listing transformer.
//!
//! On `START_EXTRACT(start_page, end_page, per_page)` it validates the
//! range, ensures an authenticated session, fetches every page with the
//! bounded dispatcher, stores each raw page, and publishes one
//! [`ListingPage`] per successful fetch. Per-URL failures are logged
//! and never abort the batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use jobrail_codec::{actions, ListingExtractCmd, ListingExtractCodec, ListingPage, ListingPageCodec};
use jobrail_fetch::{Authenticator, Dispatcher, PageFetcher};
use jobrail_gateway::{Gateway, GatewayError, Subscription};
use jobrail_lake::RawPageStore;

use crate::error::EtlError;
use crate::stage::{poll_loop, StageWorker};

pub const MAX_PER_PAGE: u32 = 50;

const BASE_URL: &str = "https://app.joinhandshake.com/job-search/";

pub struct ListingExtractor {
    gateway: Arc<Gateway>,
    raw_pages: Arc<dyn RawPageStore>,
    fetcher: Arc<dyn PageFetcher>,
    auth: Arc<dyn Authenticator>,
    dispatcher: Dispatcher,
    dead_letters: AtomicU64,
}

impl ListingExtractor {
    pub fn new(
        gateway: Arc<Gateway>,
        raw_pages: Arc<dyn RawPageStore>,
        fetcher: Arc<dyn PageFetcher>,
        auth: Arc<dyn Authenticator>,
        dispatcher: Dispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            raw_pages,
            fetcher,
            auth,
            dispatcher,
            dead_letters: AtomicU64::new(0),
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn dead_letter_count(&self) -> u64 {
        self.dead_letters.load(Ordering::SeqCst)
    }

    fn page_url(page: u32, per_page: u32) -> String {
        format!("{BASE_URL}?page={page}&per_page={per_page}")
    }

    /// The (topics, codec, notify) record for this stage.
    pub fn subscription(self: &Arc<Self>) -> Subscription {
        let stage = self.clone();
        Subscription::on_topic::<ListingExtractCodec, _, _>(move |cmd: ListingExtractCmd| {
            let stage = stage.clone();
            async move { stage.on_notify(cmd).await }
        })
    }

    async fn on_notify(&self, cmd: ListingExtractCmd) -> Result<(), GatewayError> {
        match cmd.action.as_str() {
            actions::START_EXTRACT => self
                .extract(cmd.start_page, cmd.end_page, cmd.per_page)
                .await
                .map_err(GatewayError::listener),
            other => {
                self.dead_letters.fetch_add(1, Ordering::SeqCst);
                warn!(action = other, "unrecognized action, dead-lettered");
                Ok(())
            }
        }
    }

    /// Fetch pages `start_page..=end_page` and publish each success.
    pub async fn extract(
        &self,
        start_page: u32,
        end_page: u32,
        per_page: u32,
    ) -> Result<(), EtlError> {
        if start_page < 1 || start_page > end_page || per_page < 1 || per_page > MAX_PER_PAGE {
            self.dead_letters.fetch_add(1, Ordering::SeqCst);
            warn!(
                start_page,
                end_page, per_page, "rejected extract command with out-of-range parameters"
            );
            return Ok(());
        }

        if let Err(err) = self.auth.ensure_session().await {
            error!(error = %err, "could not establish a session, abandoning batch");
            return Ok(());
        }

        let urls: Vec<String> = (start_page..=end_page)
            .map(|page| Self::page_url(page, per_page))
            .collect();
        info!(pages = urls.len(), "fetching listing pages");

        let outcomes = self.dispatcher.fetch_many(self.fetcher.clone(), urls).await;
        let mut published = 0usize;
        for outcome in outcomes {
            let Ok(html) = outcome.result else {
                continue; // already logged by the dispatcher
            };
            self.raw_pages.insert(&outcome.url, &html).await?;
            self.gateway
                .send::<ListingPageCodec>(&ListingPage::new(html), None, None)
                .await?;
            published += 1;
        }
        info!(published, "listing batch complete");
        Ok(())
    }
}

/// [`StageWorker`] wrapper for the listing extractor.
pub struct ListingExtractWorker {
    stage: Arc<ListingExtractor>,
}

impl ListingExtractWorker {
    pub fn new(stage: Arc<ListingExtractor>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl StageWorker for ListingExtractWorker {
    fn name(&self) -> &str {
        "listing-extract"
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use jobrail_fetch::{BackoffPolicy, FetchError, NullAuthenticator};
    use jobrail_gateway::MemoryLog;
    use jobrail_lake::MemoryLake;

    struct ScriptedFetcher {
        pages: Mutex<HashMap<String, Result<String, u16>>>,
    }

    impl ScriptedFetcher {
        fn serving(pages: Vec<(String, Result<String, u16>)>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into_iter().collect()),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            match self.pages.lock().unwrap().get(url) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(status)) => Err(FetchError::Status {
                    status: *status,
                    url: url.to_string(),
                }),
                None => Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    fn quick_dispatcher() -> Dispatcher {
        Dispatcher::new(
            5,
            Duration::ZERO,
            BackoffPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        )
    }

    fn stage_with(
        fetcher: Arc<dyn PageFetcher>,
    ) -> (Arc<ListingExtractor>, MemoryLog, Arc<MemoryLake>) {
        let log = MemoryLog::new();
        let gateway = Arc::new(Gateway::new(Some(log.producer()), Some(log.consumer())));
        let lake = Arc::new(MemoryLake::new());
        let stage = ListingExtractor::new(
            gateway,
            lake.clone(),
            fetcher,
            Arc::new(NullAuthenticator),
            quick_dispatcher(),
        );
        (stage, log, lake)
    }

    #[tokio::test]
    async fn extracts_each_page_and_publishes_per_success() {
        let fetcher = ScriptedFetcher::serving(vec![
            (
                ListingExtractor::page_url(1, 2),
                Ok("<main>page one</main>".to_string()),
            ),
        ]);
        let (stage, log, lake) = stage_with(fetcher);

        stage.extract(1, 1, 2).await.unwrap();

        assert_eq!(lake.raw_page_count(), 1);
        assert_eq!(log.record_count("raw.handshake.job.stage1.v1"), 1);
    }

    #[tokio::test]
    async fn failed_pages_do_not_abort_the_batch() {
        let fetcher = ScriptedFetcher::serving(vec![
            (
                ListingExtractor::page_url(1, 10),
                Ok("<main>one</main>".to_string()),
            ),
            (ListingExtractor::page_url(2, 10), Err(500)),
            (
                ListingExtractor::page_url(3, 10),
                Ok("<main>three</main>".to_string()),
            ),
        ]);
        let (stage, log, lake) = stage_with(fetcher);

        stage.extract(1, 3, 10).await.unwrap();

        // Three URLs attempted, two stored and published.
        assert_eq!(lake.raw_page_count(), 2);
        assert_eq!(log.record_count("raw.handshake.job.stage1.v1"), 2);
    }

    #[tokio::test]
    async fn rejects_out_of_range_commands() {
        let fetcher = ScriptedFetcher::serving(vec![]);
        let (stage, log, lake) = stage_with(fetcher);

        stage.extract(1, 1, 0).await.unwrap();
        stage.extract(1, 1, 51).await.unwrap();
        stage.extract(5, 2, 10).await.unwrap();
        stage.extract(0, 2, 10).await.unwrap();

        assert_eq!(stage.dead_letter_count(), 4);
        assert_eq!(lake.raw_page_count(), 0);
        assert_eq!(log.record_count("raw.handshake.job.stage1.v1"), 0);
    }

    #[tokio::test]
    async fn unknown_action_is_dead_lettered() {
        let fetcher = ScriptedFetcher::serving(vec![]);
        let (stage, _log, _lake) = stage_with(fetcher);

        let mut cmd = ListingExtractCmd::new(1, 1, 1);
        cmd.action = "START_DANCING".to_string();
        stage.on_notify(cmd).await.unwrap();

        assert_eq!(stage.dead_letter_count(), 1);
    }

    #[test]
    fn page_url_shape() {
        assert_eq!(
            ListingExtractor::page_url(3, 50),
            "https://app.joinhandshake.com/job-search/?page=3&per_page=50"
        );
    }
}
