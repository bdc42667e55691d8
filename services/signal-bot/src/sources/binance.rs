use crate::types::*;
use chrono::DateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default public REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance caps a single klines request at 1000 rows
const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Binance spot REST client (klines only)
pub struct BinanceClient {
    client: Client,
    base_url: String,
    last_request: tokio::sync::Mutex<Instant>,
}

impl BinanceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| BotError::ProviderNetwork(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_request: tokio::sync::Mutex::new(
                Instant::now()
                    .checked_sub(Duration::from_secs(10))
                    .unwrap_or_else(Instant::now),
            ),
        })
    }

    /// Minimum spacing between consecutive requests
    const MIN_REQUEST_SPACING_MS: u64 = 100;

    /// Longest Retry-After we are willing to honour
    const MAX_RETRY_WAIT_SECS: u64 = 120;

    /// `BTC/USDT` -> `BTCUSDT`
    pub fn market_symbol(symbol: &str) -> String {
        symbol
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase()
    }

    /// Spaced request wrapper with one retry on 429
    async fn rate_limited_get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value> {
        // Try up to 2 times (initial + 1 retry on rate limit)
        for attempt in 0..2 {
            {
                let mut last = self.last_request.lock().await;
                let elapsed = last.elapsed();
                let spacing = Duration::from_millis(Self::MIN_REQUEST_SPACING_MS);
                if elapsed < spacing {
                    tokio::time::sleep(spacing - elapsed).await;
                }
                *last = Instant::now();
            }

            let url = format!("{}{}", self.base_url, endpoint);
            let response = self
                .client
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        BotError::ProviderNetwork(format!("request to {} timed out", endpoint))
                    } else {
                        BotError::ProviderNetwork(e.to_string())
                    }
                })?;

            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());

                if attempt == 0 {
                    let wait_secs = retry_after.unwrap_or(60).min(Self::MAX_RETRY_WAIT_SECS);
                    warn!(
                        "Binance rate limited, waiting {} seconds before retry",
                        wait_secs
                    );
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }

                return Err(BotError::RateLimit {
                    source_name: "binance".to_string(),
                    retry_after,
                });
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let (code, message) = parse_api_error(&text);
                return Err(BotError::ProviderExchange {
                    status: status.as_u16(),
                    code,
                    message,
                });
            }

            return response
                .json::<Value>()
                .await
                .map_err(|e| BotError::InvalidResponse(e.to_string()));
        }

        Err(BotError::ProviderNetwork(
            "Unexpected retry loop exit".to_string(),
        ))
    }

    /// Get recent candles from `/api/v3/klines`
    ///
    /// Response rows: `[open_time_ms, open, high, low, close, volume, close_time, ...]`
    /// with prices encoded as strings.
    pub async fn get_klines(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let market = Self::market_symbol(symbol);
        let limit = limit.clamp(1, MAX_KLINES_PER_REQUEST);

        debug!("Requesting {} {} klines for {}", limit, timeframe, market);

        let body = self
            .rate_limited_get(
                "/api/v3/klines",
                &[
                    ("symbol", market),
                    ("interval", timeframe.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let rows = body
            .as_array()
            .ok_or_else(|| BotError::InvalidResponse("klines payload is not an array".to_string()))?;

        let mut candles = rows
            .iter()
            .map(parse_kline)
            .collect::<Result<Vec<Candle>>>()?;

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn parse_api_error(body: &str) -> (Option<i64>, String) {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => (
            v.get("code").and_then(|c| c.as_i64()),
            v.get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or(body)
                .to_string(),
        ),
        Err(_) => (None, body.to_string()),
    }
}

fn parse_kline(row: &Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 6)
        .ok_or_else(|| BotError::InvalidResponse(format!("malformed kline row: {}", row)))?;

    let open_time = fields[0]
        .as_i64()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| BotError::InvalidResponse(format!("bad kline open time: {}", fields[0])))?;

    Ok(Candle {
        timestamp: open_time,
        open: decimal_field(&fields[1])?,
        high: decimal_field(&fields[2])?,
        low: decimal_field(&fields[3])?,
        close: decimal_field(&fields[4])?,
        volume: decimal_field(&fields[5])?,
    })
}

fn decimal_field(value: &Value) -> Result<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s)
            .map_err(|e| BotError::InvalidResponse(format!("bad decimal '{}': {}", s, e))),
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .ok_or_else(|| BotError::InvalidResponse(format!("bad number {}", n))),
        other => Err(BotError::InvalidResponse(format!(
            "unexpected kline field {}",
            other
        ))),
    }
}

#[async_trait::async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        BinanceClient::get_klines(self, symbol, timeframe, limit).await
    }

    fn name(&self) -> &str {
        "binance"
    }
}
