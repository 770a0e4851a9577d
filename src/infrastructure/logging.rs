//! Optional tracing setup for host applications that have no subscriber of
//! their own. The SDK only emits through `tracing` macros; embedders with
//! an existing subscriber should skip this entirely.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// "trace", "debug", "info", "warn" or "error". Overridden by
    /// `RUST_LOG` when set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    /// "daily", "hourly", "minutely" or "never".
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "blesdk".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

pub struct LoggingGuard {
    // Keeps the non-blocking writer alive so file logs are flushed
    _guards: Vec<WorkerGuard>,
}

/// Installs a global tracing subscriber from the given settings.
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if settings.console_logging_enabled {
        Some(fmt::layer().with_writer(std::io::stdout))
    } else {
        None
    };

    let file_layer = if settings.file_logging_enabled {
        let rotation = match settings.rotation.to_lowercase().as_str() {
            "hourly" => tracing_appender::rolling::Rotation::HOURLY,
            "minutely" => tracing_appender::rolling::Rotation::MINUTELY,
            "never" => tracing_appender::rolling::Rotation::NEVER,
            _ => tracing_appender::rolling::Rotation::DAILY,
        };

        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation,
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard { _guards: guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert!(settings.console_logging_enabled);
        assert!(!settings.file_logging_enabled);
        assert_eq!(settings.rotation, "daily");
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: LogSettings = serde_json::from_str(r#"{"level": "debug"}"#).unwrap();
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.file_name_prefix, "blesdk");
    }
}
