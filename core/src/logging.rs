//! # Logging Configuration
//!
//! Standardized `tracing` setup for the execution pipeline: human-readable
//! output for local/hybrid runs, JSON output for supervised/autonomous runs
//! feeding a log aggregator. Levels are controlled with the `RUST_LOG`
//! environment variable.
//!
//! ```rust,ignore
//! use csp_core::logging::init_logging;
//!
//! fn main() {
//!     init_logging();
//!     tracing::info!("pipeline starting");
//! }
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes human-readable logging. Defaults to `INFO` when `RUST_LOG`
/// is unset.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// Initializes JSON logging for supervised/autonomous runs, where output is
/// consumed by a log aggregator rather than a human terminal.
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}
