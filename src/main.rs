mod bot;
mod config;
mod error;
mod image;
mod llm;
mod platform;
mod subscription;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,channel_gate_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional config file; environment variables take precedence
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path, explicit_path.is_some())
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Required channel: {}", config.telegram.required_channel);
    info!("  Backend: {}", config.openai.base_url);
    info!("  Chat model: {}", config.chat.model);
    info!("  Image model: {} ({})", config.image.model, config.image.size);
    info!("  Image keywords: {:?}", config.image.keywords);
    if !config.openai.has_api_key() {
        warn!("No API key configured; every generation request will fail");
    }

    platform::telegram::run(config).await?;

    Ok(())
}
