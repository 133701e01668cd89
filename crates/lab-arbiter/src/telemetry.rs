use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::{LevelFilter, ParseError};
use tracing_subscriber::EnvFilter;

/// Crates that follow `APP_LOG_LEVEL`. Dependencies stay at `warn`.
const ARBITER_TARGETS: [&str; 2] = ["lab_arbiter", "lab_arbiter_api"];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("unable to install log subscriber: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Expand a bare level such as `debug` into per-crate directives, leaving
/// dependencies at `warn`. Anything else is passed through as a filter.
pub fn filter_directives(log_level: &str) -> String {
    let log_level = log_level.trim();
    match log_level.parse::<LevelFilter>() {
        Ok(level) if level == LevelFilter::OFF => "off".to_string(),
        Ok(_) => {
            let level = log_level.to_ascii_lowercase();
            std::iter::once("warn".to_string())
                .chain(
                    ARBITER_TARGETS
                        .iter()
                        .map(|target| format!("{target}={level}")),
                )
                .collect::<Vec<_>>()
                .join(",")
        }
        Err(_) => log_level.to_string(),
    }
}

fn configured_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let directives = filter_directives(&config.log_level);
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::EnvFilter {
        value: config.log_level.clone(),
        source,
    })
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => configured_filter(config)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_targets)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
