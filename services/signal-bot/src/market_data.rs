//! Market Data Gateway - candles in, indicator bundle out

use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::indicators::{self, IndicatorBundle};
use crate::types::{BotError, CandleSource, Result, TimeFrame};

/// Fewest candles the indicator set is computed from
pub const MIN_CANDLES: usize = 50;

/// Extra candles requested on top of the minimum
const FETCH_HEADROOM: usize = 5;

pub struct MarketDataGateway {
    source: Arc<dyn CandleSource>,
    min_candles: usize,
}

impl MarketDataGateway {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self {
            source,
            min_candles: MIN_CANDLES,
        }
    }

    /// Candle count actually requested for a caller-supplied limit
    pub fn fetch_limit(&self, limit: usize) -> usize {
        limit.max(self.min_candles + FETCH_HEADROOM)
    }

    /// Fetch recent candles for `asset` and derive its indicator bundle.
    ///
    /// Fails with `InsufficientData` when fewer than the minimum candles come
    /// back, regardless of `limit`.
    pub async fn fetch(
        &self,
        asset: &str,
        timeframe: TimeFrame,
        limit: usize,
    ) -> Result<IndicatorBundle> {
        let fetch_limit = self.fetch_limit(limit);
        info!(
            asset = %asset,
            timeframe = %timeframe,
            source = self.source.name(),
            "Fetching {} candles",
            fetch_limit
        );

        let candles = match self.source.fetch_candles(asset, timeframe, fetch_limit).await {
            Ok(candles) => candles,
            Err(e) => {
                match &e {
                    BotError::ProviderNetwork(detail) => {
                        error!(asset = %asset, detail = %detail, "Data provider network error");
                    }
                    BotError::ProviderExchange { status, code, message } => {
                        error!(
                            asset = %asset,
                            status = *status,
                            code = ?code,
                            message = %message,
                            "Data provider exchange error"
                        );
                    }
                    other => {
                        error!(asset = %asset, error = %other, "Candle fetch failed");
                    }
                }
                return Err(e);
            }
        };

        if candles.len() < self.min_candles {
            warn!(
                asset = %asset,
                received = candles.len(),
                required = self.min_candles,
                "Insufficient candle history"
            );
            return Err(BotError::InsufficientData {
                symbol: asset.to_string(),
                received: candles.len(),
                required: self.min_candles,
            });
        }

        info!(asset = %asset, "Fetched {} candles", candles.len());

        let mut closes = Vec::with_capacity(candles.len());
        let mut highs = Vec::with_capacity(candles.len());
        let mut lows = Vec::with_capacity(candles.len());
        for c in &candles {
            closes.push(c.close.to_f64().unwrap_or(f64::NAN));
            highs.push(c.high.to_f64().unwrap_or(f64::NAN));
            lows.push(c.low.to_f64().unwrap_or(f64::NAN));
        }

        let bundle = indicators::compute(&closes, &highs, &lows);
        info!(asset = %asset, indicators = ?bundle, "Calculated indicators");

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Returns a fixed number of rising candles and records requested limits
    struct FixedSource {
        count: usize,
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl CandleSource for FixedSource {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe: TimeFrame,
            limit: usize,
        ) -> Result<Vec<Candle>> {
            self.requested.lock().unwrap().push(limit);
            let start = Utc::now() - Duration::minutes(15 * self.count as i64);
            Ok((0..self.count.min(limit))
                .map(|i| {
                    let close = Decimal::from(100 + i as i64);
                    Candle {
                        timestamp: start + Duration::minutes(15 * i as i64),
                        open: close,
                        high: close + Decimal::ONE,
                        low: close - Decimal::ONE,
                        close,
                        volume: Decimal::TEN,
                    }
                })
                .collect())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn gateway(count: usize) -> (MarketDataGateway, Arc<FixedSource>) {
        let source = Arc::new(FixedSource {
            count,
            requested: Mutex::new(Vec::new()),
        });
        (MarketDataGateway::new(source.clone()), source)
    }

    #[test]
    fn test_fetch_limit_floor() {
        let (gw, _) = gateway(0);
        assert_eq!(gw.fetch_limit(10), 55);
        assert_eq!(gw.fetch_limit(100), 100);
    }

    #[tokio::test]
    async fn test_small_limit_still_requests_minimum() {
        let (gw, source) = gateway(200);
        let bundle = gw.fetch("BTC/USDT", TimeFrame::Minute15, 10).await.unwrap();

        assert_eq!(*source.requested.lock().unwrap(), vec![55]);
        assert!(bundle.sma_50.is_available());
        assert_eq!(bundle.price.to_string(), "154.00");
    }

    #[tokio::test]
    async fn test_short_history_is_insufficient() {
        let (gw, _) = gateway(49);
        let err = gw.fetch("NEW/USDT", TimeFrame::Hour1, 10).await.unwrap_err();
        assert!(matches!(
            err,
            BotError::InsufficientData { received: 49, required: 50, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_history_is_insufficient() {
        let (gw, _) = gateway(0);
        let err = gw.fetch("NEW/USDT", TimeFrame::Hour1, 100).await.unwrap_err();
        assert!(matches!(err, BotError::InsufficientData { received: 0, .. }));
    }
}
