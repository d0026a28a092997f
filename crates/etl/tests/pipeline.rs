//! End-to-end pipeline test: all four stages wired over one in-memory
//! log and lake, driven by a single seed command, drained by the
//! supervisor's shutdown path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use jobrail_codec::{ListingExtractCmd, ListingExtractCodec};
use jobrail_etl::{
    DetailExtractConfig, DetailExtractWorker, DetailExtractor, DetailTransformWorker,
    DetailTransformer, ListingExtractWorker, ListingExtractor, ListingTransformWorker,
    ListingTransformer, StageWorker, Supervisor,
};
use jobrail_fetch::{BackoffPolicy, Dispatcher, FetchError, NullAuthenticator, PageFetcher};
use jobrail_gateway::{Gateway, MemoryLog};
use jobrail_lake::MemoryLake;

const LISTING_URL: &str = "https://app.joinhandshake.com/job-search/?page=1&per_page=2";

const LISTING_HTML: &str = concat!(
    "<main>",
    "<a role=\"button\" href=\"/job-search/111?x=1\" aria-label=\"View Alpha\">Alpha</a>",
    "<a role=\"button\" href=\"/job-search/222?x=1\" aria-label=\"View Beta\">Beta</a>",
    "</main>",
);

/// A detail page with the anchor shapes the transformer navigates by.
fn detail_html(position: &str, wage: &str) -> String {
    format!(
        concat!(
            "<body><div data-hook=\"job-details-page\">",
            "<div>",
            "<div><div>",
            "<a href=\"/e/1\"><div>Acme Robotics</div></a>",
            "<a href=\"/e/1/industry\"><div>Software</div></a>",
            "</div></div>",
            "<a href=\"/jobs/1?searchId=abc\"><h1>{position}</h1></a>",
            "<div>Posted 2 days ago \u{2219} Apply by January 15, 2026 at 11:59 PM</div>",
            "</div>",
            "<div>",
            "<div><h3>At a glance</h3></div>",
            "<div><svg><path d=\"M2.5 8C2.22386 8 2 7.8\"></path></svg>",
            "<div><div>{wage}</div></div></div>",
            "<div><svg><path d=\"M12 2C15.866 2 19 5.1\"></path></svg>",
            "<div><div>Remote, based in Portland, OR</div></div></div>",
            "<div><svg><path d=\"M11.5527 2.72314 11.6 2.8\"></path></svg>",
            "<div><div>Internship</div><div>Full-time</div></div></div>",
            "</div>",
            "<div><div><div><p>We automate the boring parts.</p></div></div></div>",
            "<button aria-label=\"Apply to Acme\">Apply</button>",
            "<input placeholder=\"Search your resumes\">",
            "</div></body>",
        ),
        position = position,
        wage = wage,
    )
}

struct ScriptedFetcher {
    pages: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

fn fetcher() -> Arc<ScriptedFetcher> {
    let mut pages = HashMap::new();
    pages.insert(LISTING_URL.to_string(), LISTING_HTML.to_string());
    pages.insert(
        "https://app.joinhandshake.com/jobs/111".to_string(),
        detail_html("Robot Wrangler", "$20/hr"),
    );
    pages.insert(
        "https://app.joinhandshake.com/jobs/222".to_string(),
        detail_html("Data Plumber", "$80K-$100K/yr"),
    );
    Arc::new(ScriptedFetcher {
        pages: Mutex::new(pages),
    })
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

fn gateway_over(log: &MemoryLog) -> Arc<Gateway> {
    Arc::new(Gateway::new(Some(log.producer()), Some(log.consumer())))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn seed_command_flows_through_all_four_stages() {
    let log = MemoryLog::new();
    let lake = Arc::new(MemoryLake::new());
    let fetcher = fetcher();

    let e1 = ListingExtractor::new(
        gateway_over(&log),
        lake.clone(),
        fetcher.clone(),
        Arc::new(NullAuthenticator),
        quick_dispatcher(),
    );
    let t1 = ListingTransformer::new(gateway_over(&log), lake.clone());
    let e2 = DetailExtractor::new(
        gateway_over(&log),
        lake.clone(),
        fetcher.clone(),
        Arc::new(NullAuthenticator),
        quick_dispatcher(),
        DetailExtractConfig {
            buf_size: 100,
            buf_timeout: Duration::from_millis(100),
        },
    );
    let t2 = DetailTransformer::new(gateway_over(&log), lake.clone());

    let workers: Vec<Arc<dyn StageWorker>> = vec![
        Arc::new(ListingExtractWorker::new(e1)),
        Arc::new(ListingTransformWorker::new(t1)),
        Arc::new(DetailExtractWorker::new(e2)),
        Arc::new(DetailTransformWorker::new(t2)),
    ];

    let shutdown = Arc::new(Notify::new());
    let mut handles = Vec::new();
    for worker in workers {
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            Supervisor::new().run(worker, Some(shutdown)).await
        }));
    }

    // Seed the pipeline with one extract command.
    let seed_gateway = gateway_over(&log);
    seed_gateway
        .send::<ListingExtractCodec>(&ListingExtractCmd::new(1, 1, 2), None, None)
        .await
        .unwrap();

    // Wait until both enriched records land.
    tokio::time::timeout(Duration::from_secs(30), async {
        while lake.enriched_count() < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("pipeline should enrich both postings");

    // Graceful stop: every stage drains and closes.
    shutdown.notify_waiters();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("stage should stop after the signal")
            .expect("no panic")
            .expect("stage exits cleanly");
    }

    // One raw listing page stored, one listing message consumed.
    assert_eq!(lake.raw_page_count(), 1);
    assert_eq!(log.record_count("raw.handshake.job.stage1.v1"), 1);

    // Two postings discovered, both fetched successfully.
    assert_eq!(lake.posting_count(), 2);
    for job_id in [111, 222] {
        let posting = lake.posting_by_job_id(job_id).unwrap();
        assert_eq!(posting.e2_success, Some(true), "job {job_id}");
    }

    // Two enriched records, with the cleaning rules applied.
    let alpha = lake
        .enriched_by_url("https://app.joinhandshake.com/jobs/111")
        .unwrap();
    assert_eq!(alpha.position.as_deref(), Some("robot wrangler"));
    assert_eq!(alpha.wage, Some([41_600, 41_600]));
    assert_eq!(alpha.location_type, vec!["remote"]);
    assert_eq!(alpha.apply_type.as_deref(), Some("internal"));

    let beta = lake
        .enriched_by_url("https://app.joinhandshake.com/jobs/222")
        .unwrap();
    assert_eq!(beta.wage, Some([80_000, 100_000]));
    assert_eq!(beta.documents, vec!["resume"]);

    // Both enriched records were also published downstream.
    assert_eq!(log.record_count("load.handshake.job.v1"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replaying_the_listing_does_not_redispatch_details() {
    let log = MemoryLog::new();
    let lake = Arc::new(MemoryLake::new());

    let t1 = ListingTransformer::new(gateway_over(&log), lake.clone());
    t1.transform(LISTING_HTML).await.unwrap();
    t1.transform(LISTING_HTML).await.unwrap();

    assert_eq!(lake.posting_count(), 2);
    assert_eq!(log.record_count("extract.handshake.job.stage2.v1"), 2);
}
