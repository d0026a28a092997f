//! seed — one-shot developer command that emits a listing-extract
//! command onto the log to kick off the pipeline.

use clap::Parser;

use jobrail_core::{load_dotenv, Config};

/// Send one START_EXTRACT command and exit.
#[derive(Parser, Debug)]
#[command(name = "seed", version, about)]
struct Cli {
    /// First search-result page to fetch.
    #[arg(long, default_value_t = 1)]
    start_page: u32,

    /// Last search-result page to fetch (inclusive).
    #[arg(long, default_value_t = 5)]
    end_page: u32,

    /// Results per page (1..=50).
    #[arg(long, default_value_t = 50)]
    per_page: u32,
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

    run(config, cli).await
}

#[cfg(feature = "kafka")]
async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    use std::sync::Arc;

    use jobrail_codec::{ListingExtractCmd, ListingExtractCodec};
    use jobrail_gateway::kafka::KafkaLogProducer;
    use jobrail_gateway::Gateway;

    let producer = Arc::new(KafkaLogProducer::from_config(&config.broker)?);
    let gateway = Gateway::new(Some(producer), None);

    let cmd = ListingExtractCmd::new(cli.start_page, cli.end_page, cli.per_page);
    tracing::info!(
        start_page = cmd.start_page,
        end_page = cmd.end_page,
        per_page = cmd.per_page,
        "seeding pipeline"
    );
    gateway.send::<ListingExtractCodec>(&cmd, None, None).await?;
    gateway.close().await;
    Ok(())
}

#[cfg(not(feature = "kafka"))]
async fn run(config: Config, cli: Cli) -> anyhow::Result<()> {
    let _ = (config, cli);
    anyhow::bail!("built without the `kafka` feature; rebuild with --features kafka")
}
