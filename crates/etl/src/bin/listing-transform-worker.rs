//! listing-transform-worker — turns raw listing pages into postings and
//! detail-extract commands for the postings not seen before.

use clap::Parser;

use jobrail_core::{load_dotenv, Config};

/// Listing transformer stage worker.
#[derive(Parser, Debug)]
#[command(name = "listing-transform-worker", version, about)]
struct Cli {}

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
async fn run(config: Config, _cli: Cli) -> anyhow::Result<()> {
    use std::sync::Arc;

    use jobrail_etl::{ListingTransformWorker, ListingTransformer, Supervisor};
    use jobrail_gateway::kafka::{KafkaLogConsumer, KafkaLogProducer};
    use jobrail_gateway::Gateway;
    use jobrail_lake::{collections, mongo::MongoLake};

    let producer = Arc::new(KafkaLogProducer::from_config(&config.broker)?);
    let consumer = Arc::new(KafkaLogConsumer::from_config(&config.broker)?);
    let gateway = Arc::new(Gateway::new(Some(producer), Some(consumer)));

    let lake = MongoLake::connect(&config.lake).await?;
    let postings = Arc::new(lake.postings(collections::JOB_POSTINGS));

    let stage = ListingTransformer::new(gateway, postings);
    let worker = Arc::new(ListingTransformWorker::new(stage));
    Supervisor::new().run(worker, None).await?;
    Ok(())
}

#[cfg(not(all(feature = "kafka", feature = "mongo")))]
async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    let _ = (config, cli);
    anyhow::bail!("built without the `kafka` and `mongo` features; rebuild with --features kafka,mongo")
}
