//! Indicator Computer
//!
//! Derives the fixed indicator bundle (RSI, MACD, SMA, Bollinger Bands) from a
//! close-price series. Only the most recent value of each indicator is kept.
//! Series shorter than an indicator's window yield `IndicatorValue::Unavailable`.

use rust_decimal::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const SMA_PERIOD: usize = 50;
pub const BB_PERIOD: usize = 20;
pub const BB_STD_DEV: f64 = 2.0;

/// Decimals kept for price-scale values (Price, SMA, Bollinger) and RSI
pub const PRICE_DECIMALS: u32 = 2;
/// Decimals kept for MACD histogram and signal
pub const MACD_DECIMALS: u32 = 4;

/// Marker rendered for indicators that could not be computed
pub const UNAVAILABLE: &str = "N/A";

/// A single formatted indicator reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Value(Decimal),
    /// Finite reading too large for `Decimal` at the requested scale.
    /// Such magnitudes carry no fractional bits in f64, so nothing is lost.
    Wide { value: f64, decimals: u32 },
    Unavailable,
}

impl Serialize for IndicatorValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IndicatorValue::Value(v) => Serialize::serialize(v, serializer),
            IndicatorValue::Wide { .. } => serializer.serialize_str(&self.to_string()),
            IndicatorValue::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl IndicatorValue {
    /// Decimal reading; `None` for unavailable and out-of-range values
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            IndicatorValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndicatorValue::Value(v) => v.to_f64(),
            IndicatorValue::Wide { value, .. } => Some(*value),
            IndicatorValue::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, IndicatorValue::Unavailable)
    }
}

impl fmt::Display for IndicatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorValue::Value(v) => write!(f, "{}", v),
            IndicatorValue::Wide { value, decimals } => {
                write!(f, "{:.*}", *decimals as usize, value)
            }
            IndicatorValue::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

/// Round a raw reading to `decimals` places, or mark it unavailable.
///
/// Missing, NaN and infinite inputs all map to `Unavailable`. Available
/// values always render with exactly `decimals` fractional digits; past the
/// `Decimal` range (about 1e27 at two places) they fall back to `Wide`.
pub fn format_value(value: Option<f64>, decimals: u32) -> IndicatorValue {
    let Some(raw) = value.filter(|v| v.is_finite()) else {
        return IndicatorValue::Unavailable;
    };
    let wide = IndicatorValue::Wide {
        value: raw,
        decimals,
    };
    let Some(d) = Decimal::from_f64(raw) else {
        return wide;
    };

    let mut rounded = d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    if rounded.scale() != decimals {
        return wide;
    }
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    IndicatorValue::Value(rounded)
}

/// Fixed-shape indicator snapshot for one asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorBundle {
    #[serde(rename = "Price")]
    pub price: IndicatorValue,
    #[serde(rename = "RSI_14")]
    pub rsi_14: IndicatorValue,
    #[serde(rename = "MACD_histogram")]
    pub macd_histogram: IndicatorValue,
    #[serde(rename = "MACD_signal")]
    pub macd_signal: IndicatorValue,
    #[serde(rename = "SMA_50")]
    pub sma_50: IndicatorValue,
    #[serde(rename = "BB_Upper")]
    pub bb_upper: IndicatorValue,
    #[serde(rename = "BB_Lower")]
    pub bb_lower: IndicatorValue,
    #[serde(rename = "BB_Middle")]
    pub bb_middle: IndicatorValue,
}

impl IndicatorBundle {
    /// Bundle with every reading unavailable
    pub fn unavailable() -> Self {
        Self {
            price: IndicatorValue::Unavailable,
            rsi_14: IndicatorValue::Unavailable,
            macd_histogram: IndicatorValue::Unavailable,
            macd_signal: IndicatorValue::Unavailable,
            sma_50: IndicatorValue::Unavailable,
            bb_upper: IndicatorValue::Unavailable,
            bb_lower: IndicatorValue::Unavailable,
            bb_middle: IndicatorValue::Unavailable,
        }
    }

    /// Named readings in display order
    pub fn entries(&self) -> [(&'static str, IndicatorValue); 8] {
        [
            ("Price", self.price),
            ("RSI_14", self.rsi_14),
            ("MACD_histogram", self.macd_histogram),
            ("MACD_signal", self.macd_signal),
            ("SMA_50", self.sma_50),
            ("BB_Upper", self.bb_upper),
            ("BB_Lower", self.bb_lower),
            ("BB_Middle", self.bb_middle),
        ]
    }

    pub fn all_unavailable(&self) -> bool {
        self.entries().iter().all(|(_, v)| !v.is_available())
    }

    /// Where the last price sits relative to the 50-period SMA
    pub fn price_vs_sma(&self) -> PriceVsSma {
        let ordering = match (self.price, self.sma_50) {
            (IndicatorValue::Value(price), IndicatorValue::Value(sma)) => Some(price.cmp(&sma)),
            (price, sma) => match (price.as_f64(), sma.as_f64()) {
                (Some(price), Some(sma)) => price.partial_cmp(&sma),
                _ => None,
            },
        };
        match ordering {
            Some(Ordering::Greater) => PriceVsSma::Above,
            Some(Ordering::Less) => PriceVsSma::Below,
            Some(Ordering::Equal) => PriceVsSma::Near,
            None => PriceVsSma::Unavailable,
        }
    }
}

/// Qualitative Price vs SMA(50) comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceVsSma {
    Above,
    Below,
    Near,
    Unavailable,
}

impl fmt::Display for PriceVsSma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriceVsSma::Above => "Above",
            PriceVsSma::Below => "Below",
            PriceVsSma::Near => "Near",
            PriceVsSma::Unavailable => UNAVAILABLE,
        };
        f.write_str(label)
    }
}

/// Compute the indicator bundle from aligned close/high/low series.
///
/// Highs and lows are accepted for parity with the candle extraction but the
/// current indicator set is derived from closes only.
pub fn compute(closes: &[f64], _highs: &[f64], _lows: &[f64]) -> IndicatorBundle {
    let price = closes.last().copied();
    let rsi = rsi(closes, RSI_PERIOD).last().copied();
    let macd = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
    let sma_50 = sma(closes, SMA_PERIOD).last().copied();
    let bands = bollinger(closes, BB_PERIOD, BB_STD_DEV);

    IndicatorBundle {
        price: format_value(price, PRICE_DECIMALS),
        rsi_14: format_value(rsi, PRICE_DECIMALS),
        macd_histogram: format_value(macd.and_then(|m| m.histogram), MACD_DECIMALS),
        macd_signal: format_value(macd.and_then(|m| m.signal), MACD_DECIMALS),
        sma_50: format_value(sma_50, PRICE_DECIMALS),
        bb_upper: format_value(bands.map(|b| b.upper), PRICE_DECIMALS),
        bb_lower: format_value(bands.map(|b| b.lower), PRICE_DECIMALS),
        bb_middle: format_value(bands.map(|b| b.middle), PRICE_DECIMALS),
    }
}

/// Simple moving average series (one value per full window)
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average seeded with the SMA of the first window
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for v in &values[period..] {
        prev = (v - prev) * k + prev;
        out.push(prev);
    }
    out
}

/// Wilder-smoothed RSI series
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() <= period {
        return Vec::new();
    }
    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / period as f64;

    let to_rsi = |gain: f64, loss: f64| {
        if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        }
    };

    let mut out = Vec::with_capacity(changes.len() - period + 1);
    out.push(to_rsi(avg_gain, avg_loss));
    for c in &changes[period..] {
        avg_gain = (avg_gain * (period as f64 - 1.0) + c.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + (-c).max(0.0)) / period as f64;
        out.push(to_rsi(avg_gain, avg_loss));
    }
    out
}

/// Latest MACD reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// MACD with exponential fast/slow/signal averages; `None` until the slow
/// window is filled, with signal/histogram `None` until the signal window is.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdPoint> {
    if fast == 0 || fast >= slow {
        return None;
    }
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    if slow_ema.is_empty() {
        return None;
    }
    // fast_ema starts `slow - fast` samples earlier than slow_ema
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let macd = *line.last()?;
    let signal_line = ema(&line, signal);
    let signal = signal_line.last().copied();

    Some(MacdPoint {
        macd,
        signal,
        histogram: signal.map(|s| macd - s),
    })
}

/// Latest Bollinger Bands reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger Bands over the trailing window, population standard deviation
pub fn bollinger(values: &[f64], period: usize, std_dev_mult: f64) -> Option<Bands> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(Bands {
        upper: middle + std_dev * std_dev_mult,
        middle,
        lower: middle - std_dev * std_dev_mult,
    })
}
