//! Signal Bot - periodic crypto signal analysis posted to Telegram
//!
//! Every cycle:
//! 1. Asks Gemini to shortlist assets from the candidate pool
//! 2. Fetches candles from Binance and computes indicators
//! 3. Asks Gemini to interpret the indicators
//! 4. Posts a Markdown report to the configured channel

use std::sync::Arc;
use tracing::info;

use signal_bot::{
    AppConfig, BinanceClient, CycleRunner, GeminiClient, Scheduler, TelegramClient,
};

/// Bot entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting Signal Bot...");

    // Load configuration from environment (.env honoured)
    let config = AppConfig::from_env()?;

    let candles = Arc::new(BinanceClient::new(&config.binance_api_url)?);
    let oracle = Arc::new(GeminiClient::new(
        &config.gemini_api_url,
        &config.google_api_key,
        &config.gemini_model,
        config.generation.clone(),
    )?);
    let channel = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        &config.telegram_channel_id,
    )?);

    let pipeline = Arc::new(config.pipeline.clone());
    let runner = Arc::new(CycleRunner::new(pipeline.clone(), candles, oracle, channel));
    let scheduler = Scheduler::new(runner);

    info!(
        "Candidates: {}, per cycle: {}, timeframe: {}, model: {}, every {} min",
        pipeline.candidate_pool.len(),
        pipeline.assets_per_cycle,
        pipeline.timeframe,
        config.gemini_model,
        scheduler.cadence().minutes()
    );
    info!(
        next_fire = %scheduler.cadence().next_fire_after(chrono::Utc::now()),
        "Recurring schedule armed"
    );

    scheduler.run(shutdown_signal()).await;

    info!("Signal Bot stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
