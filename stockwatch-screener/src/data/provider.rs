//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait that all data sources implement.
//! Every provider failure is a per-ticker condition: the screening pipeline
//! logs it, skips the symbol, and continues with the rest of the universe.

use async_trait::async_trait;
use thiserror::Error;

use super::PriceSeries;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to market-data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider does not know the requested symbol
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The provider answered with a body this adapter could not interpret
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Provider is temporarily unavailable
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying on a later run).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for market data providers.
///
/// All data sources implement this trait to provide a unified interface for
/// the screening pipeline; tests swap in a mock implementation.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch the trailing daily series for a symbol.
    ///
    /// # Arguments
    /// * `symbol` - Provider symbol (e.g., "005930.KS")
    /// * `lookback_days` - Calendar days of history to request; the returned
    ///   series may be shorter (new listings, holidays).
    async fn daily_series(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<PriceSeries, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::RateLimited {
            retry_after_secs: Some(60)
        }
        .is_recoverable());
        assert!(ProviderError::Unavailable("maintenance".into()).is_recoverable());
        assert!(!ProviderError::UnknownSymbol("XXXX".into()).is_recoverable());
        assert!(!ProviderError::MalformedResponse("bad json".into()).is_recoverable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Network("connection refused".into());
        assert!(err.to_string().contains("connection refused"));

        let err = ProviderError::UnknownSymbol("XXXX.KS".into());
        assert!(err.to_string().contains("XXXX.KS"));
    }
}
