//! Cycle Runner - one pass of select → fetch → analyze → compose → deliver

use std::sync::Arc;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::analyzer::SignalAnalyzer;
use crate::config::PipelineConfig;
use crate::market_data::MarketDataGateway;
use crate::notifier::Notifier;
use crate::report;
use crate::selector::AssetSelector;
use crate::types::{CandleSource, MessageChannel, ReasoningService};

/// What happened during one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    /// Assets returned by the selector, in processing order
    pub selected: Vec<String>,
    /// Assets whose report reached the channel
    pub delivered: Vec<String>,
    /// Assets dropped before a report was composed (fetch failures)
    pub skipped: Vec<String>,
    /// Assets whose report was composed but could not be delivered
    pub undelivered: Vec<String>,
}

/// Per-asset result inside a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetOutcome {
    Delivered,
    Skipped,
    Undelivered,
}

/// Drives a single analysis cycle; holds no state between cycles
pub struct CycleRunner {
    config: Arc<PipelineConfig>,
    selector: AssetSelector,
    gateway: MarketDataGateway,
    analyzer: SignalAnalyzer,
    notifier: Notifier,
}

impl CycleRunner {
    pub fn new(
        config: Arc<PipelineConfig>,
        candles: Arc<dyn CandleSource>,
        oracle: Arc<dyn ReasoningService>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            config,
            selector: AssetSelector::new(oracle.clone()),
            gateway: MarketDataGateway::new(candles),
            analyzer: SignalAnalyzer::new(oracle),
            notifier: Notifier::new(channel),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one cycle. Per-asset failures are logged and skipped; nothing
    /// propagates to the caller.
    pub async fn run_cycle(&self) -> CycleSummary {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", cycle_id = %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> CycleSummary {
        info!("Analysis cycle starting");

        let mut summary = CycleSummary {
            cycle_id,
            selected: Vec::new(),
            delivered: Vec::new(),
            skipped: Vec::new(),
            undelivered: Vec::new(),
        };

        let assets = self
            .selector
            .select(&self.config.candidate_pool, self.config.assets_per_cycle)
            .await;

        if assets.is_empty() {
            warn!("Could not select any assets for this cycle");
            return summary;
        }
        summary.selected = assets.clone();

        for asset in &assets {
            let bucket = match self.process_asset(asset).await {
                AssetOutcome::Delivered => &mut summary.delivered,
                AssetOutcome::Skipped => &mut summary.skipped,
                AssetOutcome::Undelivered => &mut summary.undelivered,
            };
            bucket.push(asset.clone());
        }

        info!(
            selected = summary.selected.len(),
            delivered = summary.delivered.len(),
            skipped = summary.skipped.len(),
            undelivered = summary.undelivered.len(),
            "Analysis cycle finished"
        );
        summary
    }

    async fn process_asset(&self, asset: &str) -> AssetOutcome {
        let timeframe = self.config.timeframe;

        let bundle = match self
            .gateway
            .fetch(asset, timeframe, self.config.candle_limit)
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(asset = %asset, error = %e, "Skipping asset, indicators unavailable");
                return AssetOutcome::Skipped;
            }
        };

        let narrative = self.analyzer.analyze(asset, timeframe, &bundle).await;
        let message = report::compose(asset, timeframe, &bundle, &narrative);
        if self.notifier.deliver(&message).await {
            AssetOutcome::Delivered
        } else {
            AssetOutcome::Undelivered
        }
    }
}
