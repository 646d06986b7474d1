//! Relay bot entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config (secrets are required)
//!   3. Init logger once at the configured level
//!   4. Build the LLM provider and the relay state
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Run the Telegram channel until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_bot::comms::telegram;
use relay_bot::error::AppError;
use relay_bot::llm::providers;
use relay_bot::memory::HistoryStore;
use relay_bot::relay::Relay;
use relay_bot::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;

    logger::init(&config.log_level)?;

    info!(
        log_level = %config.log_level,
        history_limit = config.history_limit,
        llm_provider = %config.llm.provider,
        llm_model = %config.llm.openai.model,
        "config loaded"
    );

    let llm = providers::build(&config.llm, config.llm_api_key.expose())
        .map_err(|e| AppError::Config(e.to_string()))?;
    let relay = Arc::new(Relay::new(HistoryStore::new(config.history_limit), llm));

    // Ctrl-C cancels the shared shutdown token.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrlc_token.cancel();
        }
    });

    telegram::run_telegram(&config.telegram_bot_token, relay, shutdown).await?;

    info!("relay bot stopped");
    Ok(())
}
