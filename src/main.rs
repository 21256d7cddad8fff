//! bank-mlops entry point

use bank_mlops::cli::{execute, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bank_mlops=info,tower_http=info".into()),
        )
        .init();

    execute(Cli::parse()).await
}
