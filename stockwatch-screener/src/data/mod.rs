//! Market data layer.
//!
//! Defines the core OHLCV types, the `MarketDataProvider` seam that all data
//! sources implement, and the Yahoo Finance adapter.

mod provider;
mod yahoo;

pub use provider::{MarketDataProvider, ProviderError};
pub use yahoo::YahooFinanceProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// One trading day of OHLCV data.
///
/// Immutable once constructed; `high >= max(open, close)` and
/// `low <= min(open, close)` are the provider's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Calendar date of the bar
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Intraday high
    pub high: f64,
    /// Intraday low
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Shares traded
    pub volume: u64,
}

/// Chronological daily price history for one symbol.
///
/// The constructor sorts bars by date and collapses duplicate dates (last
/// occurrence wins), so consumers can rely on strictly increasing dates.
/// Gaps are expected on non-trading days. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from raw bars, normalizing order and duplicates.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by(|next, prev| {
            if next.date == prev.date {
                *prev = next.clone();
                true
            } else {
                false
            }
        });

        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// The symbol this series belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Bars in chronological order.
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent bar, if any.
    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }
}

// ============================================================================
// Tests
// ============================================================================
