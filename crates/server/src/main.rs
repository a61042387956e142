mod api;
mod app_config;
mod cli;
mod pipeline;
mod router;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry RUST_LOG, so load it before the subscriber.
    mcqgen_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cli = cli::Cli::parse();
    let config = app_config::load_config()?;

    cli::dispatch(config, cli.command).await
}
