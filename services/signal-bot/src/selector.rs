//! Asset Selector
//!
//! Asks the reasoning service to shortlist assets from the candidate pool and
//! validates the reply. The reply is untrusted: only pool members survive,
//! duplicates collapse, and the list is capped at the requested count.

use std::sync::Arc;
use tracing::{info, warn};

use crate::types::ReasoningService;

pub struct AssetSelector {
    oracle: Arc<dyn ReasoningService>,
}

impl AssetSelector {
    pub fn new(oracle: Arc<dyn ReasoningService>) -> Self {
        Self { oracle }
    }

    /// Pick up to `count` symbols from `pool`.
    ///
    /// Never fails: an oracle error or a reply with no usable symbols both
    /// come back as an empty list.
    pub async fn select(&self, pool: &[String], count: usize) -> Vec<String> {
        if pool.is_empty() || count == 0 {
            warn!("Nothing to select from (pool={}, count={})", pool.len(), count);
            return Vec::new();
        }

        let prompt = selection_prompt(pool, count);
        info!(
            model = self.oracle.model(),
            "Requesting {} of {} candidate assets",
            count,
            pool.len()
        );

        let reply = match self.oracle.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Asset selection request failed");
                return Vec::new();
            }
        };
        let reply = reply.trim();
        info!(reply = %reply, "Received asset selection");

        let valid = parse_selection(reply, pool);
        if valid.is_empty() {
            warn!(reply = %reply, "Selection reply contained no valid candidate symbols");
            return Vec::new();
        }

        if valid.len() != count {
            warn!(
                "Selection returned {} valid symbols, expected {}",
                valid.len(),
                count
            );
        }

        let selected: Vec<String> = valid.into_iter().take(count).collect();
        info!("Selected assets: [{}]", selected.join(", "));
        selected
    }
}

/// Split a comma-delimited reply into normalized pool members, in reply order
pub fn parse_selection(reply: &str, pool: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in reply.trim().split(',') {
        let symbol = token.trim().to_uppercase();
        if pool.iter().any(|p| *p == symbol) && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

pub fn selection_prompt(pool: &[String], count: usize) -> String {
    format!(
        "Select {count} cryptocurrencies from the following list:\n\
         [{pool}]\n\
         \n\
         Selection criteria:\n\
         - Prefer assets that may currently be interesting from a technical-analysis point of view.\n\
         - Where possible make a varied selection (not all of the same kind).\n\
         - Use only your general knowledge; you do not have access to real-time data.\n\
         \n\
         Task:\n\
         List only the symbols of the {count} cryptocurrencies you selected, separated by commas. \
         Do not add any other explanation.\n\
         Example output format: BTC/USDT,ETH/USDT,SOL/USDT",
        count = count,
        pool = pool.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_normalizes_and_filters() {
        let p = pool(&["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
        let got = parse_selection(" btc/usdt , PEPE/USDT,eth/USDT,\n", &p);
        assert_eq!(got, vec!["BTC/USDT", "ETH/USDT"]);
    }

    #[test]
    fn test_parse_collapses_duplicates() {
        let p = pool(&["BTC/USDT", "ETH/USDT"]);
        let got = parse_selection("BTC/USDT,btc/usdt,ETH/USDT", &p);
        assert_eq!(got, vec!["BTC/USDT", "ETH/USDT"]);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        let p = pool(&["BTC/USDT"]);
        assert!(parse_selection("", &p).is_empty());
        assert!(parse_selection("I would pick Bitcoin.", &p).is_empty());
        assert!(parse_selection(",,,", &p).is_empty());
    }

    #[test]
    fn test_prompt_names_pool_and_count() {
        let p = pool(&["BTC/USDT", "ETH/USDT"]);
        let prompt = selection_prompt(&p, 2);
        assert!(prompt.contains("[BTC/USDT, ETH/USDT]"));
        assert!(prompt.starts_with("Select 2 cryptocurrencies"));
    }
}
