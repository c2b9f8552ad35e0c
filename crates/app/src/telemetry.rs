//! Tracing subscriber installation.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};
use crate::error::AppError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` style directives come from the config; an invalid directive
/// falls back to `info`. Fails if a global subscriber is already set.
pub fn init(config: &Config) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()
        .map_err(|e| AppError::Telemetry(e.to_string()))
}
