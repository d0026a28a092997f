//! listing-extract-worker — fetches search-result pages on command and
//! feeds raw listing HTML to the listing transformer.

use clap::Parser;

use jobrail_core::{load_dotenv, Config};

/// Listing extractor stage worker.
#[derive(Parser, Debug)]
#[command(name = "listing-extract-worker", version, about)]
struct Cli {
    /// Concurrent fetch session permit.
    #[arg(long, env = "FETCH_MAX_IN_FLIGHT", default_value_t = 5)]
    max_in_flight: usize,

    /// Minimum milliseconds between fetch launches.
    #[arg(long, env = "FETCH_MIN_INTERVAL_MS", default_value_t = 200)]
    min_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    run(config, cli).await
}

#[cfg(all(feature = "kafka", feature = "mongo"))]
async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    use std::sync::Arc;
    use std::time::Duration;

    use jobrail_etl::{ListingExtractWorker, ListingExtractor, Supervisor, LOGIN_URL};
    use jobrail_fetch::{BackoffPolicy, Dispatcher, HttpFetcher, SessionLogin};
    use jobrail_gateway::kafka::{KafkaLogConsumer, KafkaLogProducer};
    use jobrail_gateway::Gateway;
    use jobrail_lake::{collections, mongo::MongoLake};

    let producer = Arc::new(KafkaLogProducer::from_config(&config.broker)?);
    let consumer = Arc::new(KafkaLogConsumer::from_config(&config.broker)?);
    let gateway = Arc::new(Gateway::new(Some(producer), Some(consumer)));

    let lake = MongoLake::connect(&config.lake).await?;
    let raw_pages = Arc::new(lake.raw_pages(collections::RAW_LISTING_PAGES));

    let fetcher = Arc::new(HttpFetcher::new()?);
    let auth = Arc::new(SessionLogin::new(
        fetcher.client(),
        LOGIN_URL,
        config.source.clone(),
        &config.session,
        "handshake_e1",
    ));
    let dispatcher = Dispatcher::new(
        cli.max_in_flight,
        Duration::from_millis(cli.min_interval_ms),
        BackoffPolicy::default(),
    );

    let stage = ListingExtractor::new(gateway, raw_pages, fetcher, auth, dispatcher);
    let worker = Arc::new(ListingExtractWorker::new(stage));
    Supervisor::new().run(worker, None).await?;
    Ok(())
}

#[cfg(not(all(feature = "kafka", feature = "mongo")))]
async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    let _ = (config, cli);
    anyhow::bail!("built without the `kafka` and `mongo` features; rebuild with --features kafka,mongo")
}
