use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use llm_client::create_provider;
use marketwire_common::Config;
use marketwire_pipeline::fetcher::RssFetcher;
use marketwire_pipeline::pipeline::Pipeline;
use marketwire_pipeline::sources;
use marketwire_pipeline::store::PgStore;

#[derive(Parser)]
#[command(name = "marketwire-ingest", about = "Fetch, score, and publish AI market news")]
struct Args {
    /// Maximum number of unprocessed items to score this run.
    #[arg(long, default_value_t = 20)]
    batch_size: u32,

    /// Fetch and store feeds without scoring anything.
    #[arg(long)]
    fetch_only: bool,

    /// Re-queue items marked processed that never produced an article,
    /// then exit.
    #[arg(long)]
    reset_stuck: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("marketwire=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("MarketWire ingest starting...");

    let config = Config::from_env();
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    if args.reset_stuck {
        let requeued = store.reset_stuck().await?;
        info!(requeued, "Stuck items re-queued");
        return Ok(());
    }

    let llm = create_provider(
        &config.llm_provider,
        &config.anthropic_api_key,
        &config.llm_model,
    )?;

    let pipeline = Pipeline::new(
        Arc::new(store),
        Arc::new(RssFetcher::new()),
        llm,
        sources::default_sources(),
        config.relevance_threshold,
    );

    let stats = if args.fetch_only {
        pipeline.run_fetch_only().await?
    } else {
        pipeline.run(args.batch_size).await?
    };

    info!("Ingest run complete. {stats}");

    Ok(())
}
