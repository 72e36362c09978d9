//! Command-line entry point for the Delpher relink bot.
//!
//! Loads `.env`, parses configuration from arguments and environment
//! variables, and dispatches to the selected job.

mod commands;
mod config;

use tracing_subscriber::EnvFilter;

use crate::config::RelinkConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RelinkConfig::from_args()?;
    commands::run(config).await
}
