//! End-to-end pipeline harness
//!
//! Drives CycleRunner and Scheduler against in-memory collaborators:
//! select → fetch → indicators → analyze → compose → deliver


use mock_services::{MockCandles, MockChannel, MockOracle};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use signal_bot::{
    analyzer::NO_INDICATOR_DATA, report::DISCLAIMER, Clock, CycleRunner, FireOutcome, ParseMode,
    PipelineConfig, Scheduler, TimeFrame,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn test_config(pool: &[&str], per_cycle: usize) -> Arc<PipelineConfig> {
    Arc::new(PipelineConfig {
        candidate_pool: pool.iter().map(|s| s.to_string()).collect(),
        assets_per_cycle: per_cycle,
        timeframe: TimeFrame::Minute15,
        candle_limit: 100,
        every_minutes: 10,
    })
}

struct Harness {
    runner: Arc<CycleRunner>,
    oracle: Arc<MockOracle>,
    candles: Arc<MockCandles>,
    channel: Arc<MockChannel>,
}

fn harness(config: Arc<PipelineConfig>, oracle: MockOracle, candles: MockCandles, channel: MockChannel) -> Harness {
    let oracle = Arc::new(oracle);
    let candles = Arc::new(candles);
    let channel = Arc::new(channel);
    let runner = Arc::new(CycleRunner::new(
        config,
        candles.clone(),
        oracle.clone(),
        channel.clone(),
    ));
    Harness {
        runner,
        oracle,
        candles,
        channel,
    }
}

#[tokio::test]
async fn test_full_cycle_delivers_one_report_per_asset() {
    let h = harness(
        test_config(&["BTC/USDT", "ETH/USDT", "SOL/USDT"], 2),
        MockOracle::new("ETH/USDT, BTC/USDT"),
        MockCandles::new(),
        MockChannel::new(),
    );

    let summary = h.runner.run_cycle().await;

    assert_eq!(summary.selected, vec!["ETH/USDT", "BTC/USDT"]);
    assert_eq!(summary.delivered, summary.selected);
    assert!(summary.skipped.is_empty());
    assert_eq!(h.candles.requests(), vec!["ETH/USDT", "BTC/USDT"]);

    let sent = h.channel.attempts();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].0.starts_with("*🔔 ETH/USDT (15m) Signal Analysis*"));
    assert!(sent[1].0.starts_with("*🔔 BTC/USDT (15m) Signal Analysis*"));
    for (text, mode) in &sent {
        assert_eq!(*mode, ParseMode::Markdown);
        assert!(text.contains("Momentum looks constructive."));
        assert!(text.ends_with(DISCLAIMER));
    }

    // One selection call plus one analysis call per asset
    assert_eq!(h.oracle.call_count(), 3);
}

#[tokio::test]
async fn test_failed_fetch_skips_only_that_asset() {
    let h = harness(
        test_config(&["BTC/USDT", "XXX/USDT"], 2),
        MockOracle::new("XXX/USDT,BTC/USDT"),
        MockCandles::new().failing_for("XXX/USDT"),
        MockChannel::new(),
    );

    let summary = h.runner.run_cycle().await;

    assert_eq!(h.candles.requests(), vec!["XXX/USDT", "BTC/USDT"]);
    assert_eq!(summary.skipped, vec!["XXX/USDT"]);
    assert_eq!(summary.delivered, vec!["BTC/USDT"]);

    let sent = h.channel.attempts();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("BTC/USDT"));
    assert!(!sent[0].0.contains("XXX/USDT"));
}

#[tokio::test]
async fn test_empty_selection_does_no_further_work() {
    for oracle in [
        MockOracle::new("I cannot help with that."),
        MockOracle::new(""),
        MockOracle::new("BTC/USDT").with_selection_error("503 Service Unavailable"),
    ] {
        let h = harness(
            test_config(&["ETH/USDT", "SOL/USDT"], 2),
            oracle,
            MockCandles::new(),
            MockChannel::new(),
        );

        let summary = h.runner.run_cycle().await;

        assert!(summary.selected.is_empty());
        assert!(h.candles.requests().is_empty());
        assert!(h.channel.attempts().is_empty());
        assert_eq!(h.oracle.call_count(), 1);
    }
}

#[tokio::test]
async fn test_selection_output_always_within_pool_and_count() {
    let pool = ["BTC/USDT", "ETH/USDT", "SOL/USDT", "ADA/USDT"];
    let replies = [
        "btc/usdt,eth/usdt,sol/usdt,ada/usdt",
        "DOGE/USDT, PEPE/USDT",
        "BTC/USDT,BTC/USDT,BTC/USDT",
        "BTC/USDT\nETH/USDT",
        " , ,SOL/USDT,",
        "Here you go: ADA/USDT, ETH/USDT",
    ];

    for reply in replies {
        let h = harness(
            test_config(&pool, 2),
            MockOracle::new(reply),
            MockCandles::new(),
            MockChannel::new(),
        );
        let summary = h.runner.run_cycle().await;

        assert!(summary.selected.len() <= 2, "{:?} -> {:?}", reply, summary.selected);
        for asset in &summary.selected {
            assert!(pool.contains(&asset.as_str()), "{:?} -> {:?}", reply, asset);
        }
        assert_eq!(h.candles.requests(), summary.selected);
    }
}

#[tokio::test]
async fn test_delivery_failure_never_aborts_cycle() {
    let h = harness(
        test_config(&["BTC/USDT", "ETH/USDT", "SOL/USDT"], 3),
        MockOracle::new("SOL/USDT,ETH/USDT,BTC/USDT"),
        MockCandles::new(),
        MockChannel::always_failing(),
    );

    let summary = h.runner.run_cycle().await;

    assert!(summary.delivered.is_empty());
    assert_eq!(summary.undelivered, summary.selected);
    assert_eq!(h.channel.attempts().len(), 3);
    assert_eq!(h.oracle.call_count(), 4);
}

#[tokio::test]
async fn test_analysis_error_is_reported_inline() {
    let h = harness(
        test_config(&["BTC/USDT"], 1),
        MockOracle::new("BTC/USDT").with_analysis_error("quota exhausted"),
        MockCandles::new(),
        MockChannel::new(),
    );

    let summary = h.runner.run_cycle().await;
    assert_eq!(summary.delivered, vec!["BTC/USDT"]);

    let sent = h.channel.attempts();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains("⚠️ An error occurred during the AI analysis"));
    assert!(sent[0].0.contains("quota exhausted"));
    assert!(!sent[0].0.contains(NO_INDICATOR_DATA));
}

#[tokio::test]
async fn test_analysis_prompt_carries_indicator_values() {
    let h = harness(
        test_config(&["BTC/USDT"], 1),
        MockOracle::new("BTC/USDT").with_analysis_reply("Range-bound."),
        MockCandles::new(),
        MockChannel::new(),
    );

    h.runner.run_cycle().await;

    let prompts = h.oracle.prompts();
    assert_eq!(prompts.len(), 2);
    let analysis = &prompts[1];
    assert!(analysis.contains("**Asset:** BTC/USDT"));
    assert!(analysis.contains("**Timeframe:** 15m"));
    assert!(analysis.contains("RSI_14: "));
    assert!(analysis.contains("SMA_50: "));
    assert!(!analysis.contains("SMA_50: N/A"));
}

#[tokio::test]
async fn test_overlapping_fire_is_skipped() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        test_config(&["BTC/USDT"], 1),
        MockOracle::new("BTC/USDT").with_gate(gate.clone()),
        MockCandles::new(),
        MockChannel::new(),
    );
    let scheduler = Scheduler::new(h.runner.clone());

    let first = match scheduler.fire() {
        FireOutcome::Started(handle) => handle,
        FireOutcome::Skipped => panic!("first fire should start a cycle"),
    };
    assert!(scheduler.is_running());
    assert!(matches!(scheduler.fire(), FireOutcome::Skipped));

    gate.add_permits(10);
    let summary = first.await.unwrap();
    assert_eq!(summary.delivered, vec!["BTC/USDT"]);
    assert!(!scheduler.is_running());

    // Latch released, the next tick runs normally
    match scheduler.fire() {
        FireOutcome::Started(handle) => {
            handle.await.unwrap();
        }
        FireOutcome::Skipped => panic!("latch should be released"),
    }
    assert_eq!(h.channel.attempts().len(), 2);
}

#[tokio::test]
async fn test_run_fires_initial_cycle_and_stops_on_shutdown() {
    let h = harness(
        test_config(&["BTC/USDT", "ETH/USDT"], 2),
        MockOracle::new("BTC/USDT,ETH/USDT"),
        MockCandles::new(),
        MockChannel::new(),
    );
    let scheduler = Scheduler::new(h.runner.clone());

    let started = scheduler.run(async {}).await;

    assert_eq!(started, 1);
    assert!(!scheduler.is_running());
    assert_eq!(h.channel.attempts().len(), 2);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_cycle() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        test_config(&["SOL/USDT"], 1),
        MockOracle::new("SOL/USDT").with_gate(gate.clone()),
        MockCandles::new(),
        MockChannel::new(),
    );
    let scheduler = Scheduler::new(h.runner.clone());

    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.add_permits(10);
    });

    let started = scheduler.run(async {}).await;
    release.await.unwrap();

    assert_eq!(started, 1);
    assert_eq!(h.channel.attempts().len(), 1);
}

/// Clock frozen at one instant
struct FrozenClock(DateTime<Utc>);

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[tokio::test]
async fn test_recurring_tick_fires_at_next_boundary() {
    let h = harness(
        test_config(&["BTC/USDT"], 1),
        MockOracle::new("BTC/USDT"),
        MockCandles::new(),
        MockChannel::new(),
    );
    // 200ms before the 12:10 boundary of a 10-minute cadence
    let boundary = Utc.with_ymd_and_hms(2025, 3, 14, 12, 10, 0).unwrap();
    let clock = Arc::new(FrozenClock(boundary - ChronoDuration::milliseconds(200)));
    let scheduler = Scheduler::new(h.runner.clone()).with_clock(clock);

    let channel = h.channel.clone();
    let second_delivery = async move {
        for _ in 0..300 {
            if channel.attempts().len() >= 2 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };

    let started = tokio::time::timeout(Duration::from_secs(10), scheduler.run(second_delivery))
        .await
        .expect("scheduler should stop once the tick cycle delivered");

    // Initial cycle plus the 12:10 tick; the 12:20 tick is ten minutes out
    assert_eq!(started, 2);
    assert_eq!(h.channel.attempts().len(), 2);
    assert_eq!(h.oracle.call_count(), 4);
    assert!(!scheduler.is_running());
}
