mod config;
mod error;
mod identity;
mod platform;
mod router;
mod stats;
mod update;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Settings, TOKEN_ENV};
use crate::platform::telegram::{self, TelegramEmitter};
use crate::router::Router;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,idbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // An explicit path must exist; the default one is optional.
    let (config_path, required) = match std::env::args().nth(1) {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from("config.toml"), false),
    };

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path, required)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let credential = config
        .credential(std::env::var(TOKEN_ENV).ok())
        .context("Error: no token provided. Terminated.")?;

    if credential.bot_id().is_none() {
        warn!("Could not derive bot ID from token; join notifications are disabled");
    }

    let bot = Bot::new(credential.token());
    let me = bot.get_me().await.context("Failed to fetch bot profile")?;
    telegram::register_commands(&bot).await;

    let settings = Arc::new(Settings::new(&config, &credential, me.username.clone()));
    info!("Configuration loaded successfully");
    info!("  Bot: @{}", settings.bot_username.as_deref().unwrap_or("?"));
    info!("  Inline cache time: {}s", settings.inline_cache_time);
    info!("  Stats: {}", if config.stats.enabled { "on" } else { "off" });

    let tracker = stats::from_config(&config.stats);
    let emitter = Arc::new(TelegramEmitter::new(bot.clone()));
    let router = Arc::new(Router::new(settings, emitter, tracker));

    info!("Bot is starting...");
    telegram::run(bot, router, config.telegram.skip_pending_updates).await
}
