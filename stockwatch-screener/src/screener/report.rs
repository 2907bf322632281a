//! Screening run reports.
//!
//! Presentation only. The JSON watchlist record is the canonical output;
//! these renderers exist for terminals and for an optional markdown file
//! written next to it.

use super::engine::{RunSummary, Watchlist};

/// Plain-text report for the terminal.
pub fn render_console(watchlist: &Watchlist, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Screening run {} | analyzed {} | flagged {} | skipped {} | {:.1}s\n",
        watchlist.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.fetched,
        summary.flagged,
        summary.skipped.len(),
        summary.duration_secs(),
    ));
    out.push_str(&format!("Criteria: {}\n", watchlist.criteria));
    if summary.cancelled {
        out.push_str("Run was cancelled; results are partial.\n");
    }
    out.push('\n');

    if watchlist.stocks.is_empty() {
        out.push_str("No anomalies detected.\n");
    } else {
        for (rank, verdict) in watchlist.stocks.iter().enumerate() {
            out.push_str(&format!("{:>3}. {}\n", rank + 1, verdict.headline()));
        }
    }

    if !summary.skipped.is_empty() {
        out.push('\n');
        out.push_str("Skipped:\n");
        for skip in &summary.skipped {
            out.push_str(&format!("  {} ({})\n", skip.symbol, skip.reason));
        }
    }

    out
}

/// Markdown report, written on request next to the watchlist.
pub fn render_markdown(watchlist: &Watchlist, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("# Screening Report\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        watchlist.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Criteria: {}\n\n", watchlist.criteria));
    out.push_str(&format!(
        "Analyzed {} of {} tickers, flagged {}, skipped {}.\n\n",
        summary.fetched,
        summary.total,
        summary.flagged,
        summary.skipped.len(),
    ));
    if summary.cancelled {
        out.push_str("**Run was cancelled; results are partial.**\n\n");
    }

    if watchlist.stocks.is_empty() {
        out.push_str("No anomalies detected.\n");
    } else {
        out.push_str("| # | Ticker | Company | Score | Change | Volume | RSI | Reasons |\n");
        out.push_str("|---|--------|---------|-------|--------|--------|-----|--------|\n");
        for (rank, v) in watchlist.stocks.iter().enumerate() {
            let reasons: Vec<&str> = v.reasons.iter().take(3).map(String::as_str).collect();
            out.push_str(&format!(
                "| {} | {} | {} | {:.0} | {:+.1}% | {:.1}x | {:.1} | {} |\n",
                rank + 1,
                v.ticker,
                v.company_name,
                v.score,
                v.indicators.price_change_pct,
                v.indicators.volume_ratio,
                v.indicators.rsi,
                reasons.join(", "),
            ));
        }
    }

    if !summary.skipped.is_empty() {
        out.push_str("\n## Skipped\n\n");
        for skip in &summary.skipped {
            out.push_str(&format!("- `{}`: {}\n", skip.symbol, skip.reason));
        }
    }

    out
}

// ============================================================================
// Tests
// ============================================================================
