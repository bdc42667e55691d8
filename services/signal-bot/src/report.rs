//! Report Composer - pure formatting of the channel message

use crate::indicators::IndicatorBundle;
use crate::types::TimeFrame;

pub const DISCLAIMER: &str = "*⚠️ Disclaimer:* This message is generated automatically from \
technical indicators and an AI model. It is not investment advice. Crypto assets are highly \
volatile; do your own research before making any decision.";

/// Header, AI section and disclaimer for one asset
pub fn compose(asset: &str, timeframe: TimeFrame, bundle: &IndicatorBundle, narrative: &str) -> String {
    let header = format!(
        "*🔔 {asset} ({timeframe}) Signal Analysis*\n\n\
         *🔸 Price:* {price}\n\
         *📊 Key Indicators:*\n   \
         - RSI(14): {rsi}\n   \
         - MACD Hist: {hist}\n   \
         - Price vs SMA(50): {vs_sma}\n   \
         - BB Upper/Lower: {upper} / {lower}\n\n",
        asset = asset,
        timeframe = timeframe,
        price = bundle.price,
        rsi = bundle.rsi_14,
        hist = bundle.macd_histogram,
        vs_sma = bundle.price_vs_sma(),
        upper = bundle.bb_upper,
        lower = bundle.bb_lower,
    );
    let ai_section = format!("*🤖 AI Assessment:*\n{}\n\n", narrative);

    header + &ai_section + DISCLAIMER
}
