//! Anomaly rules, human-readable reasons, and recommendation scoring.
//!
//! Two rule families share one snapshot:
//! - Broad: descriptive market scan, flags on price move >= 5% or volume
//!   change >= 50% over a 10-bar window, emits multi-signal reasons.
//! - Strict: watchlist filter, flags on volume ratio >= spike threshold
//!   (20-bar window), RSI oversold, or RSI overbought.
//!
//! Both families reuse the same score so the persisted watchlist ranks
//! identically no matter which mode produced it.

use serde::{Deserialize, Serialize};

use stockwatch_common::config::ScreeningMode;

use super::indicators::IndicatorSnapshot;

// ============================================================================
// Constants
// ============================================================================

/// Broad mode: minimum close-to-close move to flag (%)
pub const BROAD_PRICE_CHANGE_PCT: f64 = 5.0;

/// Broad mode: minimum volume change vs. trailing average to flag (%)
pub const BROAD_VOLUME_CHANGE_PCT: f64 = 50.0;

/// Reasons shown in a one-line headline
const MAX_DISPLAY_REASONS: usize = 3;

// ============================================================================
// Rule Policy
// ============================================================================

/// Threshold set for one screening run.
///
/// Built from `ScreenerConfig` once per run; pure after construction.
#[derive(Debug, Clone)]
pub struct RulePolicy {
    pub mode: ScreeningMode,
    pub volume_spike_ratio: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl RulePolicy {
    /// Evaluate the snapshot under this policy's mode.
    pub fn evaluate(&self, snapshot: &IndicatorSnapshot) -> (bool, Vec<String>) {
        match self.mode {
            ScreeningMode::Broad => self.evaluate_broad(snapshot),
            ScreeningMode::Strict => self.evaluate_strict(snapshot),
        }
    }

    /// Broad scan: noteworthy on a large price move or volume change, with
    /// reasons drawn from every signal group in a fixed priority order.
    fn evaluate_broad(&self, s: &IndicatorSnapshot) -> (bool, Vec<String>) {
        let noteworthy = s.price_change_pct >= BROAD_PRICE_CHANGE_PCT
            || s.volume_change_pct >= BROAD_VOLUME_CHANGE_PCT;

        let mut reasons = Vec::new();

        if s.price_change_pct > 10.0 {
            reasons.push(format!("Surging (+{:.1}%)", s.price_change_pct));
        } else if s.price_change_pct > BROAD_PRICE_CHANGE_PCT {
            reasons.push(format!("Rising (+{:.1}%)", s.price_change_pct));
        }

        if s.volume_change_pct > 200.0 {
            reasons.push(format!("Record volume (+{:.0}%)", s.volume_change_pct));
        } else if s.volume_change_pct > 100.0 {
            reasons.push(format!("Volume surge (+{:.0}%)", s.volume_change_pct));
        } else if s.volume_change_pct > BROAD_VOLUME_CHANGE_PCT {
            reasons.push(format!("Volume rising (+{:.0}%)", s.volume_change_pct));
        }

        if s.golden_cross {
            reasons.push("Golden cross".to_string());
        }

        if s.pct_from_low_52w < 5.0 {
            reasons.push("Near 52-week low".to_string());
        } else if s.pct_from_high_52w < 1.0 {
            reasons.push("At 52-week high".to_string());
        }

        if s.rsi < self.rsi_oversold {
            reasons.push(format!("Oversold zone (RSI {:.1})", s.rsi));
        } else if s.rsi > self.rsi_overbought {
            reasons.push(format!("Overbought zone (RSI {:.1})", s.rsi));
        }

        if let (Some(short), Some(long)) = (s.ma_short, s.ma_long) {
            if s.current_price > short && short > long {
                reasons.push("Uptrend".to_string());
            } else if s.current_price < short && short < long {
                reasons.push("Downtrend".to_string());
            }
        }

        // A ticker can clear the thresholds while every reason branch stays
        // quiet (e.g. exactly at a boundary); keep the entry explainable.
        if noteworthy && reasons.is_empty() {
            reasons.push("Price movement detected".to_string());
        }

        (noteworthy, reasons)
    }

    /// Strict filter: any single trigger flags the ticker.
    fn evaluate_strict(&self, s: &IndicatorSnapshot) -> (bool, Vec<String>) {
        let mut reasons = Vec::new();

        if s.volume_ratio >= self.volume_spike_ratio {
            reasons.push(format!("Volume spike {:.1}x average", s.volume_ratio));
        }
        if s.rsi <= self.rsi_oversold {
            reasons.push(format!("Oversold (RSI {:.1})", s.rsi));
        } else if s.rsi >= self.rsi_overbought {
            reasons.push(format!("Overbought (RSI {:.1})", s.rsi));
        }

        (!reasons.is_empty(), reasons)
    }

    /// One-line description of the active criteria, embedded in the
    /// persisted watchlist for later reference.
    pub fn criteria_description(&self, volume_window: usize) -> String {
        match self.mode {
            ScreeningMode::Broad => format!(
                "price move >= {BROAD_PRICE_CHANGE_PCT}% or volume change >= \
                 {BROAD_VOLUME_CHANGE_PCT}% vs {volume_window}-day average"
            ),
            ScreeningMode::Strict => format!(
                "volume >= {:.1}x {volume_window}-day average, or RSI <= {:.0}, \
                 or RSI >= {:.0}",
                self.volume_spike_ratio, self.rsi_oversold, self.rsi_overbought
            ),
        }
    }
}

// ============================================================================
// Recommendation Score
// ============================================================================

/// Composite 0-100 score used to rank watchlist entries.
///
/// Additive over a neutral base of 50: price momentum and volume expansion
/// in tiers, a bonus for a golden cross and a mid-range RSI, penalties for a
/// death cross and an extreme RSI. Clamped to [0, 100].
pub fn recommendation_score(s: &IndicatorSnapshot) -> f64 {
    let mut score: f64 = 50.0;

    if s.price_change_pct > 7.0 {
        score += 20.0;
    } else if s.price_change_pct > 5.0 {
        score += 15.0;
    } else if s.price_change_pct > 3.0 {
        score += 10.0;
    }

    if s.volume_change_pct > 150.0 {
        score += 15.0;
    } else if s.volume_change_pct > 100.0 {
        score += 12.0;
    } else if s.volume_change_pct > 50.0 {
        score += 8.0;
    }

    if s.golden_cross {
        score += 10.0;
    }
    if s.death_cross {
        score -= 10.0;
    }

    if (40.0..=60.0).contains(&s.rsi) {
        score += 5.0;
    } else if s.rsi > 80.0 {
        score -= 5.0;
    }

    score.clamp(0.0, 100.0)
}

// ============================================================================
// Anomaly Verdict
// ============================================================================

/// The full screening result for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    /// Provider symbol
    pub ticker: String,
    /// Display name from the universe config
    pub company_name: String,
    /// Indicators the verdict was derived from
    pub indicators: IndicatorSnapshot,
    /// Whether the active rule set flagged this ticker
    pub noteworthy: bool,
    /// Human-readable trigger descriptions, priority order
    pub reasons: Vec<String>,
    /// Ranking score, higher is more interesting
    pub score: f64,
}

impl AnomalyVerdict {
    /// One-line summary for console reports, capped at three reasons.
    pub fn headline(&self) -> String {
        let shown: Vec<&str> = self
            .reasons
            .iter()
            .take(MAX_DISPLAY_REASONS)
            .map(String::as_str)
            .collect();
        format!(
            "{} ({}) {:.0} | {:+.1}% | {}",
            self.company_name,
            self.ticker,
            self.score,
            self.indicators.price_change_pct,
            shown.join(", ")
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
