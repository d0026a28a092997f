//! Bounded-concurrency fetch dispatcher.
//!
//! Fetches a batch of URLs with at most `max_in_flight` requests open
//! and a minimum interval between request launches. Per-URL failures
//! are captured in the outcome, never aborting the batch. Completion
//! order is not arrival order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::backoff::{retry, BackoffPolicy};
use crate::error::FetchError;
use crate::fetcher::PageFetcher;

/// Default concurrent-session permit.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// Result of fetching one URL from a batch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<String, FetchError>,
}

pub struct Dispatcher {
    max_in_flight: usize,
    min_interval: Duration,
    policy: BackoffPolicy,
}

impl Dispatcher {
    pub fn new(max_in_flight: usize, min_interval: Duration, policy: BackoffPolicy) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            min_interval,
            policy,
        }
    }

    /// Fetch every URL, bounded and rate-limited. One outcome per URL.
    pub async fn fetch_many(
        &self,
        fetcher: Arc<dyn PageFetcher>,
        urls: Vec<String>,
    ) -> Vec<FetchOutcome> {
        // Launch gate: each task claims the next allowed start instant.
        let gate = Arc::new(Mutex::new(Instant::now()));
        let min_interval = self.min_interval;
        let policy = self.policy;

        stream::iter(urls)
            .map(|url| {
                let fetcher = fetcher.clone();
                let gate = gate.clone();
                async move {
                    {
                        let mut next_launch = gate.lock().await;
                        let now = Instant::now();
                        if *next_launch > now {
                            tokio::time::sleep_until(*next_launch).await;
                        }
                        *next_launch = Instant::now() + min_interval;
                    }
                    let result = retry(policy, || fetcher.fetch(&url)).await;
                    if let Err(err) = &result {
                        warn!(url = %url, error = %err, "fetch failed after retries");
                    }
                    FetchOutcome { url, result }
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_IN_FLIGHT,
            Duration::from_millis(200),
            BackoffPolicy::default(),
        )
    }
}
