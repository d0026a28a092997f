//! Detail extractor: amortizes high-latency page fetches across a
//! batch and drains cleanly on shutdown.
//!
//! Commands accumulate in a FIFO buffer; a dedicated worker task flushes
//! when the buffer reaches [`DetailExtractConfig::buf_size`] or every
//! [`DetailExtractConfig::buf_timeout`], whichever comes first. At most
//! one batch is in flight. `shutdown` returns only once every command
//! enqueued before it was accepted has been processed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use jobrail_codec::{actions, DetailExtractCmd, DetailExtractCodec, DetailPage, DetailPageCodec};
use jobrail_fetch::{Authenticator, Dispatcher, PageFetcher};
use jobrail_gateway::{Gateway, GatewayError, Subscription};
use jobrail_lake::PostingStore;

use crate::error::EtlError;
use crate::stage::{poll_loop, StageWorker};

#[derive(Debug, Clone, Copy)]
pub struct DetailExtractConfig {
    /// Buffer length that triggers an immediate flush.
    pub buf_size: usize,
    /// Longest a buffered command waits before a timed flush.
    pub buf_timeout: Duration,
}

impl Default for DetailExtractConfig {
    fn default() -> Self {
        Self {
            buf_size: 100,
            buf_timeout: Duration::from_secs(30),
        }
    }
}

struct Inner {
    gateway: Arc<Gateway>,
    postings: Arc<dyn PostingStore>,
    fetcher: Arc<dyn PageFetcher>,
    auth: Arc<dyn Authenticator>,
    dispatcher: Dispatcher,
    config: DetailExtractConfig,
    buf: AsyncMutex<VecDeque<DetailExtractCmd>>,
    flush: Notify,
    stop: AtomicBool,
    dead_letters: AtomicU64,
    batches: AtomicU64,
}

pub struct DetailExtractor {
    inner: Arc<Inner>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DetailExtractor {
    /// Build the stage and start its batch worker task.
    pub fn new(
        gateway: Arc<Gateway>,
        postings: Arc<dyn PostingStore>,
        fetcher: Arc<dyn PageFetcher>,
        auth: Arc<dyn Authenticator>,
        dispatcher: Dispatcher,
        config: DetailExtractConfig,
    ) -> Arc<Self> {
        let inner = Arc::new(Inner {
            gateway,
            postings,
            fetcher,
            auth,
            dispatcher,
            config,
            buf: AsyncMutex::new(VecDeque::new()),
            flush: Notify::new(),
            stop: AtomicBool::new(false),
            dead_letters: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        });
        let worker = tokio::spawn(Inner::worker_loop(inner.clone()));
        Arc::new(Self {
            inner,
            worker: std::sync::Mutex::new(Some(worker)),
        })
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.inner.gateway
    }

    pub fn dead_letter_count(&self) -> u64 {
        self.inner.dead_letters.load(Ordering::SeqCst)
    }

    /// Batches flushed so far.
    pub fn batch_count(&self) -> u64 {
        self.inner.batches.load(Ordering::SeqCst)
    }

    pub async fn buffered(&self) -> usize {
        self.inner.buf.lock().await.len()
    }

    pub fn subscription(self: &Arc<Self>) -> Subscription {
        let stage = self.clone();
        Subscription::on_topic::<DetailExtractCodec, _, _>(move |cmd: DetailExtractCmd| {
            let stage = stage.clone();
            async move { stage.on_notify(cmd).await }
        })
    }

    async fn on_notify(&self, cmd: DetailExtractCmd) -> Result<(), GatewayError> {
        match cmd.action.as_str() {
            actions::START_EXTRACT => {
                let buffered = {
                    let mut buf = self.inner.buf.lock().await;
                    buf.push_back(cmd);
                    buf.len()
                };
                if buffered >= self.inner.config.buf_size {
                    self.inner.flush.notify_one();
                }
                Ok(())
            }
            other => {
                self.inner.dead_letters.fetch_add(1, Ordering::SeqCst);
                warn!(action = other, "unrecognized action, dead-lettered");
                Ok(())
            }
        }
    }

    /// Request-stop, wake the worker, and wait for it to acknowledge by
    /// exiting. No command enqueued before this call is dropped.
    pub async fn shutdown(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        self.inner.flush.notify_one();
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "batch worker ended abnormally");
            }
        }
        info!("detail extractor drained");
    }
}

impl Inner {
    async fn worker_loop(inner: Arc<Inner>) {
        loop {
            let flushed = inner.flush.notified();
            tokio::select! {
                _ = flushed => {}
                _ = tokio::time::sleep(inner.config.buf_timeout) => {}
            }

            // One batch in flight at a time; keep draining so nothing
            // enqueued before a stop request is left behind.
            loop {
                let batch: Vec<DetailExtractCmd> =
                    { inner.buf.lock().await.drain(..).collect() };
                if batch.is_empty() {
                    break;
                }
                inner.batches.fetch_add(1, Ordering::SeqCst);
                inner.extract(batch).await;
            }

            if inner.stop.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    /// Fetch every URL in the batch; publish a [`DetailPage`] and set
    /// `e2_success` per outcome.
    async fn extract(&self, batch: Vec<DetailExtractCmd>) {
        info!(batch = batch.len(), "extracting detail pages");
        let urls: Vec<String> = batch.iter().map(|cmd| cmd.url.clone()).collect();

        if let Err(err) = self.auth.ensure_session().await {
            error!(error = %err, "could not establish a session, marking batch failed");
            for url in &urls {
                self.mark(url, false).await;
            }
            return;
        }

        let outcomes = self.dispatcher.fetch_many(self.fetcher.clone(), urls).await;
        for outcome in outcomes {
            match outcome.result {
                Ok(html) => {
                    let page = DetailPage::new(outcome.url.clone(), html, Utc::now());
                    match self.gateway.send::<DetailPageCodec>(&page, None, None).await {
                        Ok(()) => self.mark(&outcome.url, true).await,
                        Err(err) => {
                            error!(url = %outcome.url, error = %err, "failed to publish detail page");
                            self.mark(&outcome.url, false).await;
                        }
                    }
                }
                Err(_) => self.mark(&outcome.url, false).await,
            }
        }
    }

    async fn mark(&self, url: &str, success: bool) {
        if let Err(err) = self.postings.set_e2_success(url, success).await {
            error!(url, error = %err, "failed to record fetch outcome");
        }
    }
}

/// [`StageWorker`] wrapper for the detail extractor. Teardown drains
/// the batch buffer before the gateway closes.
pub struct DetailExtractWorker {
    stage: Arc<DetailExtractor>,
}

impl DetailExtractWorker {
    pub fn new(stage: Arc<DetailExtractor>) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl StageWorker for DetailExtractWorker {
    fn name(&self) -> &str {
        "detail-extract"
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
        self.stage.shutdown().await;
        self.stage.gateway().close().await;
        Ok(())
    }
}
