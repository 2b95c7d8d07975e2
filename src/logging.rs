//! # Structured Logging
//!
//! Environment-aware `tracing` initialization. Console output by default;
//! set `FMV_TRACKER_LOG_FORMAT=json` for machine-readable lines.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process. Safe to call from
/// multiple entry points; later calls are no-ops, and an already-installed
/// global subscriber (e.g. in tests) is left alone.
pub fn init_tracing() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_env("FMV_TRACKER_LOG")
            .unwrap_or_else(|_| EnvFilter::new(default_log_level(&get_environment())));

        let json = std::env::var("FMV_TRACKER_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .boxed()
        } else {
            fmt::layer().with_target(true).with_level(true).boxed()
        };

        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}

/// Current environment from environment variables.
fn get_environment() -> String {
    std::env::var("FMV_TRACKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default log level based on environment.
fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
