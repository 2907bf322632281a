//! Stockwatch Screener Library
//!
//! A deterministic technical-indicator anomaly screener over daily OHLCV
//! series. One run pulls a price series per configured ticker, derives
//! indicators (RSI, moving averages, 52-week range, cross detection, volume
//! ratios), applies the active rule set, then ranks and persists a single
//! canonical watchlist record.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      stockwatch-screener                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌───────────────────┐   ┌────────────────┐  │
//! │  │  Market Data │──▶│  Screening        │──▶│  Watchlist     │  │
//! │  │  Provider    │   │  Pipeline         │   │  Store         │  │
//! │  │  (Yahoo)     │   │  rules + scoring  │   │  (atomic JSON) │  │
//! │  └──────────────┘   └───────────────────┘   └────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Screening modes
//! - **Broad**: descriptive market scan; flags large price moves or volume
//!   expansion against a 10-bar average, reasons across every signal group.
//! - **Strict**: watchlist filter; flags volume spikes against a 20-bar
//!   average and RSI extremes.
//!
//! ## Failure policy
//! Per-ticker failures (fetch errors, short history) are logged skips; the
//! run continues. Persistence and configuration errors are fatal.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod screener;
pub mod store;
