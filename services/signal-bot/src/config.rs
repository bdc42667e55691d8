//! Bot Configuration
//!
//! Read once at startup and shared immutably for the life of the process.

use std::fmt;

use crate::types::TimeFrame;

/// Default candidate pool: popular Binance USDT pairs
pub const DEFAULT_CANDIDATE_ASSETS: [&str; 20] = [
    "BTC/USDT", "ETH/USDT", "BNB/USDT", "SOL/USDT", "XRP/USDT",
    "DOGE/USDT", "ADA/USDT", "SHIB/USDT", "AVAX/USDT", "TRX/USDT",
    "DOT/USDT", "LINK/USDT", "MATIC/USDT", "LTC/USDT", "ICP/USDT",
    "BCH/USDT", "NEAR/USDT", "UNI/USDT", "APT/USDT", "FIL/USDT",
];

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro-exp-03-25";

/// Startup configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable required")]
    Missing(&'static str),

    #[error("Invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub google_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub pipeline: PipelineConfig,
    pub gemini_model: String,
    pub generation: GenerationSettings,
    pub gemini_api_url: String,
    pub binance_api_url: String,
    pub telegram_api_url: String,
}

/// What one cycle does and how often
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Universe the selector may choose from, in declared order
    pub candidate_pool: Vec<String>,
    /// Upper bound on assets analysed per cycle
    pub assets_per_cycle: usize,
    pub timeframe: TimeFrame,
    /// Candles requested per asset (gateway raises this to its minimum)
    pub candle_limit: usize,
    /// Fire on wall-clock minutes divisible by this value
    pub every_minutes: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidate_pool: DEFAULT_CANDIDATE_ASSETS.iter().map(|s| s.to_string()).collect(),
            assets_per_cycle: 3,
            timeframe: TimeFrame::Minute15,
            candle_limit: 100,
            every_minutes: 10,
        }
    }
}

/// Sampling and content-safety settings for the reasoning service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub blocked_categories: Vec<HarmCategory>,
    pub block_threshold: BlockThreshold,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
            blocked_categories: vec![
                HarmCategory::Harassment,
                HarmCategory::HateSpeech,
                HarmCategory::SexuallyExplicit,
                HarmCategory::DangerousContent,
            ],
            block_threshold: BlockThreshold::MediumAndAbove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl fmt::Display for HarmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockThreshold {
    MediumAndAbove,
}

impl fmt::Display for BlockThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockThreshold::MediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
        })
    }
}

impl AppConfig {
    /// Load from `.env` (if present) and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let google_api_key = required("GOOGLE_API_KEY")?;
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let telegram_channel_id = required("TELEGRAM_CHANNEL_ID")?;

        let defaults = PipelineConfig::default();

        let candidate_pool = match get("CANDIDATE_ASSETS") {
            Some(raw) => parse_pool(&raw)?,
            None => defaults.candidate_pool,
        };

        let assets_per_cycle = match get("ASSETS_PER_CYCLE") {
            Some(raw) => parse_in_range("ASSETS_PER_CYCLE", &raw, 1, usize::MAX)?,
            None => defaults.assets_per_cycle,
        };

        let timeframe = match get("ANALYSIS_TIMEFRAME") {
            Some(raw) => raw.parse::<TimeFrame>().map_err(|reason| ConfigError::Invalid {
                key: "ANALYSIS_TIMEFRAME",
                value: raw.clone(),
                reason,
            })?,
            None => defaults.timeframe,
        };

        let candle_limit = match get("CANDLE_LIMIT") {
            Some(raw) => parse_in_range("CANDLE_LIMIT", &raw, 1, 1000)?,
            None => defaults.candle_limit,
        };

        let every_minutes = match get("SCHEDULE_EVERY_MINUTES") {
            Some(raw) => parse_in_range("SCHEDULE_EVERY_MINUTES", &raw, 1, 60)?,
            None => defaults.every_minutes,
        };

        Ok(Self {
            google_api_key,
            telegram_bot_token,
            telegram_channel_id,
            pipeline: PipelineConfig {
                candidate_pool,
                assets_per_cycle,
                timeframe,
                candle_limit,
                every_minutes,
            },
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            generation: GenerationSettings::default(),
            gemini_api_url: get("GEMINI_API_URL")
                .unwrap_or_else(|| crate::gemini::DEFAULT_BASE_URL.to_string()),
            binance_api_url: get("BINANCE_API_URL")
                .unwrap_or_else(|| crate::sources::binance::DEFAULT_BASE_URL.to_string()),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| crate::telegram::DEFAULT_BASE_URL.to_string()),
        })
    }
}

fn parse_pool(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut pool: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !pool.contains(&symbol) {
            pool.push(symbol);
        }
    }
    if pool.is_empty() {
        return Err(ConfigError::Invalid {
            key: "CANDIDATE_ASSETS",
            value: raw.to_string(),
            reason: "no symbols listed".to_string(),
        });
    }
    Ok(pool)
}

fn parse_in_range<T>(key: &'static str, raw: &str, min: T, max: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + fmt::Display,
{
    let value = raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: "not a number".to_string(),
    })?;
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: format!("must be between {} and {}", min, max),
        });
    }
    Ok(value)
}
