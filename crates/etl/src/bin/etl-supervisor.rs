//! etl-supervisor — spawns the four stage workers as child processes,
//! forwards termination signals to the group, and awaits them.

use clap::Parser;

use jobrail_etl::{pipeline_specs, EtlSupervisor};

/// Composite supervisor for the four-stage pipeline.
#[derive(Parser, Debug)]
#[command(name = "etl-supervisor", version, about)]
struct Cli {
    /// Comma-separated list of workers to start (default: all).
    #[arg(long, value_delimiter = ',')]
    only: Option<Vec<String>>,
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
    let specs: Vec<_> = pipeline_specs()
        .into_iter()
        .filter(|spec| {
            cli.only
                .as_ref()
                .map_or(true, |filter| filter.contains(&spec.name))
        })
        .collect();
    if specs.is_empty() {
        anyhow::bail!(
            "no matching workers for --only {:?}; available: {:?}",
            cli.only.unwrap_or_default(),
            pipeline_specs()
                .iter()
                .map(|s| s.name.clone())
                .collect::<Vec<_>>()
        );
    }

    tracing::info!(workers = specs.len(), "starting pipeline");
    let group = EtlSupervisor::spawn(&specs)?;
    group.run().await?;
    tracing::info!("pipeline stopped");
    Ok(())
}
