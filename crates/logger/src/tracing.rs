use std::env::var;

use serde::{Deserialize, Serialize};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the process log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_env_value(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Logging section of the service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default level directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format, overridden by `RUST_LOG_FORMAT`
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::Compact }
    }
}

impl LogSettings {
    fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }
}

pub fn init(settings: &LogSettings) {
    initialize_tracing(settings.level_filter(), resolve_format(settings.format));
}

/// `RUST_LOG_FORMAT` wins over the configured format when it holds a known value.
fn resolve_format(configured: LogFormat) -> LogFormat {
    match var("RUST_LOG_FORMAT") {
        Ok(value) => LogFormat::from_env_value(&value).unwrap_or_else(|| {
            warn!("Unknown RUST_LOG_FORMAT {value:?}, using {configured:?}");
            configured
        }),
        Err(_) => configured,
    }
}

/// Initialize tracing subscriber with default configuration.
fn initialize_tracing(level: LevelFilter, format: LogFormat) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_parsing() {
        let settings = LogSettings { level: "debug".into(), format: LogFormat::Json };
        assert_eq!(settings.level_filter(), LevelFilter::DEBUG);

        let settings = LogSettings { level: "nonsense".into(), ..LogSettings::default() };
        assert_eq!(settings.level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn test_format_env_values() {
        assert_eq!(LogFormat::from_env_value("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_env_value("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::from_env_value("pretty"), None);
    }
}
