//! Signal Bot Library
//!
//! Periodic crypto signal analysis: pick a few assets, derive indicators from
//! recent candles, ask a language model for a read, post the report.

pub mod analyzer;
pub mod config;
pub mod gemini;
pub mod indicators;
pub mod market_data;
pub mod notifier;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod selector;
pub mod sources {
    pub mod binance;
}
pub mod telegram;
pub mod types;


// Re-export main types for convenience
pub use analyzer::SignalAnalyzer;
pub use config::{AppConfig, ConfigError, GenerationSettings, PipelineConfig};
pub use gemini::GeminiClient;
pub use indicators::{IndicatorBundle, IndicatorValue, PriceVsSma};
pub use market_data::MarketDataGateway;
pub use notifier::Notifier;
pub use runner::{CycleRunner, CycleSummary};
pub use scheduler::{Cadence, Clock, FireOutcome, Scheduler, SystemClock};
pub use selector::AssetSelector;
pub use sources::binance::BinanceClient;
pub use telegram::TelegramClient;
pub use types::{
    BotError, Candle, CandleSource, MessageChannel, ParseMode, ReasoningService, Result, TimeFrame,
};
