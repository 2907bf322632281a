//! Technical indicator computation.
//!
//! Pure functions from a `PriceSeries` to an `IndicatorSnapshot`: no I/O, no
//! mutation of the input, and every field recomputed from scratch on each
//! call so repeated runs over the same data are bit-identical.
//!
//! Degenerate inputs follow explicit, named fallback rules rather than
//! exception suppression:
//! - a zero denominator in any percent-change reads as 0.0;
//! - a zero trailing average volume reads as [`FLAT_VOLUME_RATIO`];
//! - an RSI window with zero losses reads 100 on pure gains and
//!   [`RSI_NEUTRAL`] when flat;
//! - an RSI window shorter than the period is averaged over however many
//!   deltas exist.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::PriceSeries;

// ============================================================================
// Constants
// ============================================================================

/// Short moving-average window (bars).
pub const SHORT_MA_WINDOW: usize = 5;

/// Long moving-average window (bars).
pub const LONG_MA_WINDOW: usize = 20;

/// Trading bars in a 52-week range.
pub const TRADING_DAYS_52W: usize = 252;

/// RSI reported for a window with zero gain and zero loss.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Volume ratio reported when the trailing average volume is zero.
pub const FLAT_VOLUME_RATIO: f64 = 1.0;

/// Minimum bars needed to compare the latest close to the previous one.
pub const MIN_BARS: usize = 2;

// ============================================================================
// Errors
// ============================================================================

/// Failure modes of indicator computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// The series is too short to derive anything; the caller skips the
    /// ticker rather than aborting the run.
    #[error("insufficient data: got {got} bars, need at least {need}")]
    InsufficientData { got: usize, need: usize },
}

// ============================================================================
// Indicator Snapshot
// ============================================================================

/// Derived per-ticker metrics at the most recent bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Latest close
    pub current_price: f64,
    /// Close of the bar before it
    pub previous_close: f64,
    /// Close-to-close change (%)
    pub price_change_pct: f64,
    /// Latest bar volume
    pub current_volume: u64,
    /// Trailing average volume over the caller's window (includes the
    /// current bar)
    pub avg_volume: f64,
    /// Volume vs. trailing average (%)
    pub volume_change_pct: f64,
    /// Current volume divided by the trailing average
    pub volume_ratio: f64,
    /// 5-bar simple moving average (None with fewer than 5 bars)
    pub ma_short: Option<f64>,
    /// 20-bar simple moving average (None with fewer than 20 bars)
    pub ma_long: Option<f64>,
    /// Short average crossed above the long average on the latest bar
    pub golden_cross: bool,
    /// Short average crossed below the long average on the latest bar
    pub death_cross: bool,
    /// Highest high over the trailing 252 bars (or all available)
    pub high_52w: f64,
    /// Lowest low over the trailing 252 bars (or all available)
    pub low_52w: f64,
    /// Distance below the 52-week high (%)
    pub pct_from_high_52w: f64,
    /// Distance above the 52-week low (%)
    pub pct_from_low_52w: f64,
    /// RSI over the caller's period
    pub rsi: f64,
}

// ============================================================================
// Computation
// ============================================================================

/// Percent change from `old` to `new`.
///
/// A zero denominator fails closed to 0.0: it is a data-quality condition,
/// not a programming error.
pub fn percent_change(new: f64, old: f64) -> f64 {
    if old == 0.0 {
        0.0
    } else {
        (new - old) / old * 100.0
    }
}

/// Simple mean of the trailing `window` values, or None if fewer exist.
fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// RSI over the trailing `period` close-to-close deltas.
///
/// Gains are positive deltas (zero otherwise), losses the absolute value of
/// negative deltas; both are averaged over the trailing window, taking
/// however many deltas exist when fewer than `period` are available. The
/// zero-loss branches are explicit: pure gains read 100, a flat window reads
/// [`RSI_NEUTRAL`].
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() < 2 || period == 0 {
        return RSI_NEUTRAL;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let tail = &deltas[deltas.len().saturating_sub(period)..];
    let n = tail.len() as f64;

    let avg_gain = tail.iter().filter(|d| **d > 0.0).sum::<f64>() / n;
    let avg_loss = tail.iter().filter(|d| **d < 0.0).map(|d| -d).sum::<f64>() / n;

    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { RSI_NEUTRAL };
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Compute an [`IndicatorSnapshot`] at the most recent bar.
///
/// `volume_window` is the trailing window for the average volume (10 or 20
/// bars depending on the screening mode); `rsi_period` is the RSI window.
/// Fewer than [`MIN_BARS`] bars is an error the caller handles by skipping
/// the ticker.
pub fn compute_snapshot(
    series: &PriceSeries,
    volume_window: usize,
    rsi_period: usize,
) -> Result<IndicatorSnapshot, IndicatorError> {
    let bars = series.bars();
    if bars.len() < MIN_BARS {
        return Err(IndicatorError::InsufficientData {
            got: bars.len(),
            need: MIN_BARS,
        });
    }

    let latest = &bars[bars.len() - 1];
    let previous = &bars[bars.len() - 2];

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let price_change_pct = percent_change(latest.close, previous.close);

    // The volume window includes the current bar, like every other trailing
    // mean in this module.
    let window = volume_window.max(1).min(volumes.len());
    let avg_volume = trailing_mean(&volumes, window).unwrap_or(0.0);
    let (volume_change_pct, volume_ratio) = if avg_volume > 0.0 {
        (
            percent_change(latest.volume as f64, avg_volume),
            latest.volume as f64 / avg_volume,
        )
    } else {
        (0.0, FLAT_VOLUME_RATIO)
    };

    let ma_short = trailing_mean(&closes, SHORT_MA_WINDOW);
    let ma_long = trailing_mean(&closes, LONG_MA_WINDOW);
    let prev_closes = &closes[..closes.len() - 1];
    let ma_short_prev = trailing_mean(prev_closes, SHORT_MA_WINDOW);
    let ma_long_prev = trailing_mean(prev_closes, LONG_MA_WINDOW);

    // A cross needs both averages on both bars; anything undefined means no
    // signal.
    let (golden_cross, death_cross) = match (ma_short, ma_long, ma_short_prev, ma_long_prev) {
        (Some(sc), Some(lc), Some(sp), Some(lp)) => (sp <= lp && sc > lc, sp >= lp && sc < lc),
        _ => (false, false),
    };

    let range = &bars[bars.len().saturating_sub(TRADING_DAYS_52W)..];
    let high_52w = range.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low_52w = range.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let pct_from_high_52w = if high_52w == 0.0 {
        0.0
    } else {
        (high_52w - latest.close) / high_52w * 100.0
    };
    let pct_from_low_52w = percent_change(latest.close, low_52w);

    Ok(IndicatorSnapshot {
        current_price: latest.close,
        previous_close: previous.close,
        price_change_pct,
        current_volume: latest.volume,
        avg_volume,
        volume_change_pct,
        volume_ratio,
        ma_short,
        ma_long,
        golden_cross,
        death_cross,
        high_52w,
        low_52w,
        pct_from_high_52w,
        pct_from_low_52w,
        rsi: rsi(&closes, rsi_period),
    })
}

// ============================================================================
// Tests
// ============================================================================
