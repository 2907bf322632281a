//! Shared building blocks for Stockwatch services.
//!
//! Provides the unified configuration file format and the logging setup used
//! by every Stockwatch binary.

pub mod config;
pub mod logging;
