use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OHLCV candle for technical analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Supported timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFrame {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Day1,
    Week1,
}

impl TimeFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::Minute1 => "1m",
            TimeFrame::Minute5 => "5m",
            TimeFrame::Minute15 => "15m",
            TimeFrame::Minute30 => "30m",
            TimeFrame::Hour1 => "1h",
            TimeFrame::Hour4 => "4h",
            TimeFrame::Day1 => "1d",
            TimeFrame::Week1 => "1w",
        }
    }

    pub fn to_seconds(&self) -> i64 {
        match self {
            TimeFrame::Minute1 => 60,
            TimeFrame::Minute5 => 300,
            TimeFrame::Minute15 => 900,
            TimeFrame::Minute30 => 1800,
            TimeFrame::Hour1 => 3600,
            TimeFrame::Hour4 => 14400,
            TimeFrame::Day1 => 86400,
            TimeFrame::Week1 => 604800,
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFrame {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(TimeFrame::Minute1),
            "5m" => Ok(TimeFrame::Minute5),
            "15m" => Ok(TimeFrame::Minute15),
            "30m" => Ok(TimeFrame::Minute30),
            "1h" => Ok(TimeFrame::Hour1),
            "4h" => Ok(TimeFrame::Hour4),
            "1d" => Ok(TimeFrame::Day1),
            "1w" => Ok(TimeFrame::Week1),
            other => Err(format!("unsupported timeframe '{}'", other)),
        }
    }
}

/// Rendering mode for outgoing channel messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
}

/// Error types for the signal pipeline
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Insufficient OHLCV data for {symbol}: received {received}, required {required}")]
    InsufficientData {
        symbol: String,
        received: usize,
        required: usize,
    },

    #[error("Data provider network error: {0}")]
    ProviderNetwork(String),

    #[error("Data provider exchange error (status {status}, code {code:?}): {message}")]
    ProviderExchange {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit {
        source_name: String,
        retry_after: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Reasoning service error: {0}")]
    Oracle(String),

    #[error("Message delivery failed: {0}")]
    Delivery(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, BotError>;

/// Exchange candle feed
#[async_trait::async_trait]
pub trait CandleSource: Send + Sync {
    /// Get up to `limit` most recent candles, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<Vec<Candle>>;

    /// Source name
    fn name(&self) -> &str;
}

/// Text-in, text-out AI reasoning service
///
/// Replies that were blocked by the content policy come back as an empty
/// string rather than an error.
#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs
    fn model(&self) -> &str;
}

/// Outbound messaging channel
#[async_trait::async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send_message(&self, text: &str, mode: ParseMode) -> Result<()>;

    /// Channel identifier, for logs
    fn channel_id(&self) -> &str;
}
