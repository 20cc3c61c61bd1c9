//! Predictive maintenance - main entry point

use clap::Parser;
use predictive_maintenance::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "predictive_maintenance=info,tower_http=info".into()),
        )
        .init();

    run(Cli::parse()).await
}
