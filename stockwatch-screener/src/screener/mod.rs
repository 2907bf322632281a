//! Screening engine layer.
//!
//! `indicators` derives per-ticker metrics, `rules` turns them into verdicts
//! and scores, `engine` orchestrates a run over the universe, and `report`
//! renders the outcome.

pub mod engine;
pub mod indicators;
pub mod report;
pub mod rules;

pub use engine::{CancelFlag, RunSummary, ScreeningPipeline, SkipCause, SkippedTicker, Watchlist};
pub use indicators::{IndicatorError, IndicatorSnapshot};
pub use rules::AnomalyVerdict;
