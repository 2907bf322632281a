//! Configuration management for Stockwatch services.
//!
//! Configuration lives in a single JSON file at `~/.stockwatch/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (STOCKWATCH_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `STOCKWATCH_LOG_LEVEL` → observability.log_level
//! - `STOCKWATCH_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".stockwatch"),
        |dirs| dirs.home_dir().join(".stockwatch"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration shared by all binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" for structured JSON, "pretty" for human-readable
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Ticker Universe
// ============================================================================

/// One entry of the screening universe.
///
/// The universe is injected from configuration rather than hardcoded so that
/// all consumers share a single symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    /// Provider symbol (e.g., "005930.KS")
    pub symbol: String,
    /// Human-readable company name
    pub display_name: String,
}

// ============================================================================
// Data Source Configuration
// ============================================================================

/// Market-data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Provider name (currently "yahoo")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Calendar days of history to request per ticker.
    ///
    /// 420 calendar days comfortably covers the 252 trading bars needed for
    /// true 52-week bounds; shorter series degrade to all available bars.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            lookback_days: default_lookback_days(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "yahoo".to_string()
}

fn default_lookback_days() -> u32 {
    420
}

fn default_request_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Screening Mode
// ============================================================================

/// Anomaly rule set applied by the screening pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningMode {
    /// Broad recommendation rules: price change >= 5% or volume 50% above
    /// its 10-bar trailing average.
    Broad,
    /// Strict anomaly rules: volume >= 2x its 20-bar trailing average, or
    /// RSI at an oversold/overbought extreme.
    #[default]
    Strict,
}

impl fmt::Display for ScreeningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broad => write!(f, "broad"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for ScreeningMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broad" => Ok(Self::Broad),
            "strict" => Ok(Self::Strict),
            _ => Err(format!(
                "Unknown screening mode: {s} (expected 'broad' or 'strict')"
            )),
        }
    }
}

// ============================================================================
// Screener Configuration
// ============================================================================

/// Configuration for the screening pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Active anomaly rule set
    #[serde(default)]
    pub mode: ScreeningMode,

    /// Courtesy delay between external fetches (milliseconds).
    ///
    /// A deliberate throttle for third-party rate limits, not a performance
    /// accident. Set to 0 only against local or mock providers.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Keep only the top K ranked verdicts (None = keep all)
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Trailing window for the RSI average gain/loss
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Trailing volume window used by broad mode (bars)
    #[serde(default = "default_broad_volume_window")]
    pub broad_volume_window: usize,

    /// Trailing volume window used by strict mode (bars)
    #[serde(default = "default_strict_volume_window")]
    pub strict_volume_window: usize,

    /// Strict mode: volume ratio at or above this flags a spike
    #[serde(default = "default_volume_spike_ratio")]
    pub volume_spike_ratio: f64,

    /// RSI at or below this reads as oversold
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,

    /// RSI at or above this reads as overbought
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,

    /// Canonical watchlist record location
    #[serde(default = "default_watchlist_path")]
    pub watchlist_path: PathBuf,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            mode: ScreeningMode::default(),
            request_delay_ms: default_request_delay_ms(),
            top_k: None,
            rsi_period: default_rsi_period(),
            broad_volume_window: default_broad_volume_window(),
            strict_volume_window: default_strict_volume_window(),
            volume_spike_ratio: default_volume_spike_ratio(),
            rsi_oversold: default_rsi_oversold(),
            rsi_overbought: default_rsi_overbought(),
            watchlist_path: default_watchlist_path(),
        }
    }
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_rsi_period() -> usize {
    14
}

fn default_broad_volume_window() -> usize {
    10
}

fn default_strict_volume_window() -> usize {
    20
}

fn default_volume_spike_ratio() -> f64 {
    2.0
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_watchlist_path() -> PathBuf {
    config_dir().join("watchlist.json")
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Top-level Stockwatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Ticker universe to screen
    #[serde(default)]
    pub universe: Vec<TickerEntry>,

    /// Market-data source configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Screening pipeline configuration
    #[serde(default)]
    pub screener: ScreenerConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration from an explicit path.
    ///
    /// A missing file yields the default configuration; an unreadable or
    /// unparseable file is an unrecoverable configuration error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("STOCKWATCH_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("STOCKWATCH_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
