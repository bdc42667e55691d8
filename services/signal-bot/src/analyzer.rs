//! Signal Analyzer - indicator bundle to narrative

use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::indicators::IndicatorBundle;
use crate::types::{ReasoningService, TimeFrame};

pub const NO_INDICATOR_DATA: &str = "No valid indicator data was available for analysis.";
pub const EMPTY_REPLY: &str =
    "⚠️ The AI model returned no content for this analysis (the reply may have been blocked).";

pub struct SignalAnalyzer {
    oracle: Arc<dyn ReasoningService>,
}

impl SignalAnalyzer {
    pub fn new(oracle: Arc<dyn ReasoningService>) -> Self {
        Self { oracle }
    }

    /// Produce a narrative for one asset. Always returns non-empty text;
    /// failures become an inline warning so they still reach the channel.
    pub async fn analyze(&self, asset: &str, timeframe: TimeFrame, bundle: &IndicatorBundle) -> String {
        if bundle.all_unavailable() {
            warn!(asset = %asset, "All indicators unavailable, skipping model call");
            return NO_INDICATOR_DATA.to_string();
        }

        let prompt = analysis_prompt(asset, timeframe, bundle);
        info!(asset = %asset, model = self.oracle.model(), "Requesting signal analysis");

        match self.oracle.generate(&prompt).await {
            Ok(text) if text.trim().is_empty() => {
                warn!(asset = %asset, "Analysis reply was empty");
                EMPTY_REPLY.to_string()
            }
            Ok(text) => {
                info!(asset = %asset, chars = text.len(), "Received signal analysis");
                text
            }
            Err(e) => {
                error!(asset = %asset, error = %e, "Signal analysis request failed");
                format!("⚠️ An error occurred during the AI analysis: {}", e)
            }
        }
    }
}

pub fn analysis_prompt(asset: &str, timeframe: TimeFrame, bundle: &IndicatorBundle) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "**Analysis request:** technical signal review");
    let _ = writeln!(prompt, "*   **Asset:** {}", asset);
    let _ = writeln!(prompt, "*   **Timeframe:** {}", timeframe);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "**Current indicator values:**");
    for (name, value) in bundle.entries() {
        let _ = writeln!(prompt, "*   {}: {}", name, value);
    }
    let _ = writeln!(prompt, "*   Price vs SMA(50): {}", bundle.price_vs_sma());
    let _ = writeln!(prompt);
    prompt.push_str(
        "**Task:** Interpret these indicators together and assess the short-term outlook.\n\
         1. Overall direction (bullish / bearish / neutral) and how strong the signal is.\n\
         2. The key signals behind it (RSI level, MACD momentum, position relative to SMA 50).\n\
         3. Support and resistance suggested by the Bollinger Bands.\n\
         4. Risks or conflicting signals worth watching.\n\
         5. A one-line summary.\n\
         \n\
         **Output format:** concise Markdown, no more than 200 words. \
         Treat unavailable values (N/A) as missing data. Do not give investment advice.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::format_value;

    fn bundle() -> IndicatorBundle {
        let mut b = IndicatorBundle::unavailable();
        b.price = format_value(Some(101.0), 2);
        b.sma_50 = format_value(Some(99.5), 2);
        b.rsi_14 = format_value(Some(61.234), 2);
        b
    }

    #[test]
    fn test_prompt_lists_every_indicator() {
        let prompt = analysis_prompt("ETH/USDT", TimeFrame::Hour4, &bundle());
        assert!(prompt.contains("**Asset:** ETH/USDT"));
        assert!(prompt.contains("**Timeframe:** 4h"));
        assert!(prompt.contains("RSI_14: 61.23"));
        assert!(prompt.contains("MACD_histogram: N/A"));
        assert!(prompt.contains("BB_Middle: N/A"));
        assert!(prompt.contains("Price vs SMA(50): Above"));
    }
}
