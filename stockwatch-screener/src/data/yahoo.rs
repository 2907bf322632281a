//! Yahoo Finance chart API adapter.
//!
//! # API
//! <https://query1.finance.yahoo.com/v8/finance/chart/{symbol}>
//!
//! Unauthenticated daily candles with enough history for 52-week bounds.
//! Rows with null OHLCV entries (holiday artifacts) are dropped before the
//! series is built.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{MarketDataProvider, ProviderError};
use super::{PriceBar, PriceSeries};

// ============================================================================
// Constants
// ============================================================================

/// Yahoo Finance API base URL
const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

/// Chart (candle history) endpoint
const CHART_ENDPOINT: &str = "/v8/finance/chart";

/// Default per-request timeout (seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

// ============================================================================
// Response Payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartPayload,
}

#[derive(Debug, Deserialize)]
struct ChartPayload {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[allow(dead_code)] // Parsed for completeness; only description is surfaced
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// ============================================================================
// Yahoo Finance Provider
// ============================================================================

/// Yahoo Finance adapter for daily market data.
pub struct YahooFinanceProvider {
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    /// Create a new provider with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stockwatch-screener/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

impl Default for YahooFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn daily_series(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<PriceSeries, ProviderError> {
        let period2 = Utc::now().timestamp();
        let period1 = period2 - i64::from(lookback_days) * SECONDS_PER_DAY;
        let url = format!(
            "{YAHOO_API_BASE}{CHART_ENDPOINT}/{symbol}?period1={period1}&period2={period2}&interval=1d"
        );

        debug!(symbol, url = %url, "Fetching daily series from Yahoo Finance");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::UnknownSymbol(symbol.to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!("HTTP {status}")));
        }

        let payload: ChartResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        parse_chart(symbol, payload)
    }
}

/// Convert a chart payload into a normalized series.
fn parse_chart(symbol: &str, payload: ChartResponse) -> Result<PriceSeries, ProviderError> {
    if let Some(err) = payload.chart.error {
        return Err(ProviderError::UnknownSymbol(format!(
            "{symbol}: {}",
            err.description
        )));
    }

    let result = payload
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| ProviderError::MalformedResponse("empty chart result".to_string()))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("missing quote block".to_string()))?;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
            quote.volume.get(i).copied().flatten(),
        ) else {
            // Null rows are non-trading artifacts.
            continue;
        };

        let Some(date) = DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(PriceSeries::new(symbol, bars))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BODY: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1717372800, 1717459200, 1717545600],
                "indicators": {
                    "quote": [{
                        "open":   [100.0, null, 102.0],
                        "high":   [101.0, null, 103.5],
                        "low":    [99.0,  null, 101.0],
                        "close":  [100.5, null, 103.0],
                        "volume": [10000, null, 12000]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_skips_null_rows() {
        let payload: ChartResponse = serde_json::from_str(SAMPLE_BODY).unwrap();
        let series = parse_chart("TEST.KS", payload).unwrap();
        assert_eq!(series.len(), 2);
        assert!((series.latest().unwrap().close - 103.0).abs() < f64::EPSILON);
        assert_eq!(series.latest().unwrap().volume, 12000);
    }

    #[test]
    fn test_parse_chart_surfaces_api_error() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        let payload: ChartResponse = serde_json::from_str(body).unwrap();
        let err = parse_chart("GONE.KS", payload).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownSymbol(_)));
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_parse_chart_rejects_empty_result() {
        let body = r#"{"chart": {"result": [], "error": null}}"#;
        let payload: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            parse_chart("TEST.KS", payload),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
