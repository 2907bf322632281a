//! Screening pipeline.
//!
//! Walks the configured universe one ticker at a time: fetch the daily
//! series, derive indicators, evaluate the active rule policy, score and
//! accumulate noteworthy tickers, then rank them into a `Watchlist`.
//!
//! Per-ticker failures (fetch errors, too little history) are recorded as
//! skips and never abort the run. A cooperative cancellation flag is checked
//! between tickers; a cancelled run ranks and returns whatever it has.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use stockwatch_common::config::{ScreenerConfig, ScreeningMode, TickerEntry};

use crate::data::{MarketDataProvider, ProviderError};

use super::indicators::{compute_snapshot, IndicatorError};
use super::rules::{recommendation_score, AnomalyVerdict, RulePolicy};

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation handle, checked between tickers.
///
/// Clone freely; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

// ============================================================================
// Run Output
// ============================================================================

/// The persisted screening record. Each run fully replaces the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchlist {
    /// When the run that produced this record finished
    pub generated_at: DateTime<Utc>,
    /// Human-readable description of the active criteria
    pub criteria: String,
    /// Tickers the run evaluated (skips excluded)
    pub total_analyzed: usize,
    /// Flagged tickers, score descending, universe order on ties
    pub stocks: Vec<AnomalyVerdict>,
}

/// Step at which a ticker dropped out of the run.
///
/// A fetch failure means the data source never delivered a series; an
/// indicator failure means the series arrived but was unusable. The CLI
/// treats a run where every ticker failed at the fetch step as an outage,
/// while an all-indicator-failure run is still a valid (empty) result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipCause {
    /// The provider could not deliver a series
    Fetch,
    /// The series was too short for indicator computation
    Indicator,
}

/// A ticker the run could not evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTicker {
    pub symbol: String,
    pub cause: SkipCause,
    pub reason: String,
}

/// Operational account of one screening pass.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Universe size
    pub total: usize,
    /// Tickers with a usable series
    pub fetched: usize,
    /// Tickers that made the watchlist
    pub flagged: usize,
    /// Tickers skipped, with reasons
    pub skipped: Vec<SkippedTicker>,
    /// Whether the run stopped early on the cancellation flag
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1_000.0
    }

    /// Tickers that failed at the fetch step.
    pub fn fetch_failures(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.cause == SkipCause::Fetch)
            .count()
    }
}

// ============================================================================
// Per-Ticker Error
// ============================================================================

/// Anything that makes one ticker unevaluable. Always a skip, never fatal.
#[derive(Debug, Error)]
enum TickerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

impl TickerError {
    fn cause(&self) -> SkipCause {
        match self {
            Self::Provider(_) => SkipCause::Fetch,
            Self::Indicator(_) => SkipCause::Indicator,
        }
    }
}

// ============================================================================
// Screening Pipeline
// ============================================================================

/// Sequential screener over a configured ticker universe.
///
/// Generic over the data provider so tests run against a mock.
pub struct ScreeningPipeline<P> {
    provider: P,
    universe: Vec<TickerEntry>,
    config: ScreenerConfig,
    lookback_days: u32,
    cancel: CancelFlag,
}

impl<P: MarketDataProvider> ScreeningPipeline<P> {
    pub fn new(
        provider: P,
        universe: Vec<TickerEntry>,
        config: ScreenerConfig,
        lookback_days: u32,
    ) -> Self {
        Self {
            provider,
            universe,
            config,
            lookback_days,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for requesting cancellation from another task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn policy(&self) -> RulePolicy {
        RulePolicy {
            mode: self.config.mode,
            volume_spike_ratio: self.config.volume_spike_ratio,
            rsi_oversold: self.config.rsi_oversold,
            rsi_overbought: self.config.rsi_overbought,
        }
    }

    fn volume_window(&self) -> usize {
        match self.config.mode {
            ScreeningMode::Broad => self.config.broad_volume_window,
            ScreeningMode::Strict => self.config.strict_volume_window,
        }
    }

    /// Evaluate one ticker end to end.
    async fn evaluate_ticker(
        &self,
        entry: &TickerEntry,
        policy: &RulePolicy,
    ) -> Result<AnomalyVerdict, TickerError> {
        let series = self
            .provider
            .daily_series(&entry.symbol, self.lookback_days)
            .await?;

        let snapshot = compute_snapshot(&series, self.volume_window(), self.config.rsi_period)?;
        let (noteworthy, reasons) = policy.evaluate(&snapshot);
        let score = recommendation_score(&snapshot);

        debug!(
            symbol = %entry.symbol,
            noteworthy,
            score,
            rsi = snapshot.rsi,
            volume_ratio = snapshot.volume_ratio,
            "Evaluated ticker"
        );

        Ok(AnomalyVerdict {
            ticker: entry.symbol.clone(),
            company_name: entry.display_name.clone(),
            indicators: snapshot,
            noteworthy,
            reasons,
            score,
        })
    }

    /// Run one screening pass over the whole universe.
    pub async fn run(&self) -> (Watchlist, RunSummary) {
        let started_at = Utc::now();
        let policy = self.policy();
        let delay = Duration::from_millis(self.config.request_delay_ms);

        info!(
            mode = %self.config.mode,
            universe = self.universe.len(),
            provider = self.provider.name(),
            "Starting screening run"
        );

        let mut flagged: Vec<AnomalyVerdict> = Vec::new();
        let mut skipped: Vec<SkippedTicker> = Vec::new();
        let mut fetched = 0usize;
        let mut cancelled = false;

        for (i, entry) in self.universe.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = self.universe.len() - i, "Run cancelled");
                cancelled = true;
                break;
            }

            // Courtesy pacing toward the upstream API.
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.evaluate_ticker(entry, &policy).await {
                Ok(verdict) => {
                    fetched += 1;
                    if verdict.noteworthy {
                        info!(
                            symbol = %verdict.ticker,
                            score = verdict.score,
                            reasons = ?verdict.reasons,
                            "Flagged ticker"
                        );
                        flagged.push(verdict);
                    }
                }
                Err(e) => {
                    warn!(symbol = %entry.symbol, error = %e, "Skipping ticker");
                    skipped.push(SkippedTicker {
                        symbol: entry.symbol.clone(),
                        cause: e.cause(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Stable sort keeps universe order between equal scores.
        flagged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        if let Some(k) = self.config.top_k {
            flagged.truncate(k);
        }

        let completed_at = Utc::now();
        let summary = RunSummary {
            total: self.universe.len(),
            fetched,
            flagged: flagged.len(),
            skipped,
            cancelled,
            started_at,
            completed_at,
        };

        info!(
            fetched = summary.fetched,
            flagged = summary.flagged,
            skipped = summary.skipped.len(),
            duration_secs = summary.duration_secs(),
            "Screening run finished"
        );

        let watchlist = Watchlist {
            generated_at: completed_at,
            criteria: policy.criteria_description(self.volume_window()),
            total_analyzed: fetched,
            stocks: flagged,
        };

        (watchlist, summary)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PriceBar, PriceSeries};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::collections::HashMap;

    struct MockProvider {
        series: HashMap<String, PriceSeries>,
        failures: HashMap<String, ProviderError>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                series: HashMap::new(),
                failures: HashMap::new(),
            }
        }

        fn with_series(mut self, symbol: &str, series: PriceSeries) -> Self {
            self.series.insert(symbol.to_string(), series);
            self
        }

        fn with_failure(mut self, symbol: &str, err: ProviderError) -> Self {
            self.failures.insert(symbol.to_string(), err);
            self
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn daily_series(
            &self,
            symbol: &str,
            _lookback_days: u32,
        ) -> Result<PriceSeries, ProviderError> {
            if let Some(err) = self.failures.get(symbol) {
                return Err(err.clone());
            }
            self.series
                .get(symbol)
                .cloned()
                .ok_or_else(|| ProviderError::UnknownSymbol(symbol.to_string()))
        }
    }

    fn series(symbol: &str, closes: &[f64], volumes: &[u64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (close, volume))| PriceBar {
                date: start + ChronoDuration::days(i as i64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: *volume,
            })
            .collect();
        PriceSeries::new(symbol, bars)
    }

    fn entry(symbol: &str) -> TickerEntry {
        TickerEntry {
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
        }
    }

    fn test_config(mode: ScreeningMode) -> ScreenerConfig {
        ScreenerConfig {
            mode,
            request_delay_ms: 0,
            ..ScreenerConfig::default()
        }
    }

    /// 21 rising closes; the final bar trades 3x the steady volume.
    fn spike_series(symbol: &str) -> PriceSeries {
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64).collect();
        let mut volumes = vec![1_000u64; 20];
        volumes.push(3_000);
        series(symbol, &closes, &volumes)
    }

    fn quiet_series(symbol: &str) -> PriceSeries {
        series(symbol, &vec![100.0; 30], &vec![1_000; 30])
    }

    #[tokio::test]
    async fn test_strict_flags_volume_spike() {
        let provider = MockProvider::new().with_series("AAAA", spike_series("AAAA"));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("AAAA")],
            test_config(ScreeningMode::Strict),
            420,
        );

        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(watchlist.stocks.len(), 1);
        assert_eq!(watchlist.total_analyzed, 1);
        let verdict = &watchlist.stocks[0];
        // avg over last 20 bars = (19 * 1000 + 3000) / 20 = 1100; ratio 2.73x
        assert!(verdict
            .reasons
            .iter()
            .any(|r| r.starts_with("Volume spike 2.7x")));
    }

    #[tokio::test]
    async fn test_strict_boundary_ratio_exactly_two() {
        // 19 bars at 900 then one at 1900: avg over 20 = 950, ratio 2.0.
        let closes = vec![100.0; 21];
        let mut volumes = vec![900u64; 20];
        volumes.push(1_900);
        // Drop the first bar so the 20-bar window is 19 * 900 + 1900.
        let on_boundary = series("ON", &closes[1..], &volumes[1..]);

        let mut volumes_below = vec![900u64; 20];
        volumes_below.push(1_899);
        let below = series("BELOW", &closes[1..], &volumes_below[1..]);

        let provider = MockProvider::new()
            .with_series("ON", on_boundary)
            .with_series("BELOW", below);
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("ON"), entry("BELOW")],
            test_config(ScreeningMode::Strict),
            420,
        );

        let (watchlist, _) = pipeline.run().await;
        let flagged: Vec<&str> = watchlist.stocks.iter().map(|v| v.ticker.as_str()).collect();
        assert_eq!(flagged, vec!["ON"]);
    }

    #[tokio::test]
    async fn test_provider_failure_skips_without_aborting() {
        let provider = MockProvider::new()
            .with_failure("DEAD", ProviderError::Network("timeout".into()))
            .with_series("LIVE", spike_series("LIVE"));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("DEAD"), entry("LIVE")],
            test_config(ScreeningMode::Strict),
            420,
        );

        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].symbol, "DEAD");
        assert!(summary.skipped[0].reason.contains("timeout"));
        assert_eq!(watchlist.stocks.len(), 1);
        assert_eq!(watchlist.stocks[0].ticker, "LIVE");
    }

    #[tokio::test]
    async fn test_short_series_skips() {
        let provider =
            MockProvider::new().with_series("TINY", series("TINY", &[100.0], &[1_000]));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("TINY")],
            test_config(ScreeningMode::Strict),
            420,
        );

        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].cause, SkipCause::Indicator);
        assert!(summary.skipped[0].reason.contains("insufficient data"));
        assert!(watchlist.stocks.is_empty());
    }

    #[tokio::test]
    async fn test_skip_causes_distinguish_fetch_from_short_history() {
        let provider = MockProvider::new()
            .with_failure("DEAD", ProviderError::Network("timeout".into()))
            .with_series("TINY", series("TINY", &[100.0], &[1_000]));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("DEAD"), entry("TINY")],
            test_config(ScreeningMode::Strict),
            420,
        );

        let (_, summary) = pipeline.run().await;
        assert_eq!(summary.skipped.len(), 2);
        let cause_of = |symbol: &str| {
            summary
                .skipped
                .iter()
                .find(|s| s.symbol == symbol)
                .map(|s| s.cause)
        };
        assert_eq!(cause_of("DEAD"), Some(SkipCause::Fetch));
        assert_eq!(cause_of("TINY"), Some(SkipCause::Indicator));
        assert_eq!(summary.fetch_failures(), 1);
    }

    #[tokio::test]
    async fn test_all_short_histories_is_not_a_fetch_outage() {
        // Every ticker fetches fine but lacks usable history; the summary
        // must not read as a data-source outage.
        let provider = MockProvider::new()
            .with_series("NEW1", series("NEW1", &[100.0], &[1_000]))
            .with_series("NEW2", series("NEW2", &[200.0], &[2_000]));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("NEW1"), entry("NEW2")],
            test_config(ScreeningMode::Strict),
            420,
        );

        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.skipped.len(), 2);
        assert_eq!(summary.fetch_failures(), 0);
        assert!(watchlist.stocks.is_empty());
    }

    #[tokio::test]
    async fn test_empty_universe_yields_empty_watchlist() {
        let pipeline = ScreeningPipeline::new(
            MockProvider::new(),
            vec![],
            test_config(ScreeningMode::Strict),
            420,
        );
        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.total, 0);
        assert!(watchlist.stocks.is_empty());
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_quiet_universe_yields_empty_watchlist() {
        let provider = MockProvider::new().with_series("CALM", quiet_series("CALM"));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("CALM")],
            test_config(ScreeningMode::Strict),
            420,
        );
        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.flagged, 0);
        assert!(watchlist.stocks.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_is_score_descending_with_stable_ties() {
        // T1 and T2 tie (flat closes, volume spike: 50 + 15 + 5 = 70) and
        // outrank the riser (50 + 15 volume - 5 RSI extreme = 60); universe
        // order holds between the tied pair.
        let provider = MockProvider::new()
            .with_series("RISER", spike_series("RISER"))
            .with_series("T1", quiet_spike())
            .with_series("T2", quiet_spike());
        let mut config = test_config(ScreeningMode::Strict);
        config.top_k = None;
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("T1"), entry("RISER"), entry("T2")],
            config,
            420,
        );

        let (watchlist, _) = pipeline.run().await;
        let order: Vec<&str> = watchlist.stocks.iter().map(|v| v.ticker.as_str()).collect();
        assert_eq!(order, vec!["T1", "T2", "RISER"]);
        assert_eq!(watchlist.stocks[0].score, watchlist.stocks[1].score);
        assert!(watchlist.stocks[1].score > watchlist.stocks[2].score);
    }

    /// Flat closes with a final volume spike: flagged in strict mode but
    /// scores below a riser.
    fn quiet_spike() -> PriceSeries {
        let closes = vec![100.0; 21];
        let mut volumes = vec![1_000u64; 20];
        volumes.push(5_000);
        series("T", &closes, &volumes)
    }

    #[tokio::test]
    async fn test_top_k_truncation() {
        let provider = MockProvider::new()
            .with_series("A", quiet_spike())
            .with_series("B", quiet_spike())
            .with_series("C", quiet_spike());
        let mut config = test_config(ScreeningMode::Strict);
        config.top_k = Some(2);
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("A"), entry("B"), entry("C")],
            config,
            420,
        );
        let (watchlist, summary) = pipeline.run().await;
        assert_eq!(summary.flagged, 2);
        assert_eq!(watchlist.stocks.len(), 2);
        assert_eq!(watchlist.stocks[0].ticker, "A");
    }

    #[tokio::test]
    async fn test_cancellation_between_tickers() {
        let provider = MockProvider::new()
            .with_series("A", spike_series("A"))
            .with_series("B", spike_series("B"));
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("A"), entry("B")],
            test_config(ScreeningMode::Strict),
            420,
        );
        pipeline.cancel_flag().cancel();

        let (watchlist, summary) = pipeline.run().await;
        assert!(summary.cancelled);
        assert_eq!(summary.fetched, 0);
        assert!(watchlist.stocks.is_empty());
    }

    #[tokio::test]
    async fn test_run_is_deterministic() {
        let make = || {
            let provider = MockProvider::new().with_series("AAAA", spike_series("AAAA"));
            ScreeningPipeline::new(
                provider,
                vec![entry("AAAA")],
                test_config(ScreeningMode::Strict),
                420,
            )
        };
        let (first, _) = make().run().await;
        let (second, _) = make().run().await;
        assert_eq!(first.stocks.len(), second.stocks.len());
        assert_eq!(first.stocks[0].indicators, second.stocks[0].indicators);
        assert_eq!(first.stocks[0].reasons, second.stocks[0].reasons);
        assert_eq!(first.stocks[0].score, second.stocks[0].score);
    }

    #[tokio::test]
    async fn test_broad_mode_flags_price_surge() {
        // Steady closes then a 6% jump on the final bar.
        let mut closes = vec![100.0; 20];
        closes.push(106.0);
        let provider = MockProvider::new().with_series(
            "JUMP",
            series("JUMP", &closes, &vec![1_000; 21]),
        );
        let pipeline = ScreeningPipeline::new(
            provider,
            vec![entry("JUMP")],
            test_config(ScreeningMode::Broad),
            420,
        );
        let (watchlist, _) = pipeline.run().await;
        assert_eq!(watchlist.stocks.len(), 1);
        assert!(watchlist.stocks[0]
            .reasons
            .iter()
            .any(|r| r.starts_with("Rising")));
    }
}
