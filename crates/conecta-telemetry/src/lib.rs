//! Tracing subscriber setup for the Conecta binary and tests.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Emit one-line compact output instead of the default fmt layout.
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            compact: true,
        }
    }
}

/// Install the global tracing subscriber. RUST_LOG wins over the
/// configured default level. Calling this twice panics, so the binary
/// does it exactly once at startup; tests use `try_init_telemetry`.
pub fn init_telemetry(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.compact {
        builder.compact().init();
    } else {
        builder.init();
    }
}

/// Non-panicking variant for tests, where another test may already have
/// installed a subscriber.
pub fn try_init_telemetry(config: &TelemetryConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.compact);
    }

    #[test]
    fn try_init_is_idempotent() {
        let config = TelemetryConfig::default();
        // First call may or may not win depending on test ordering;
        // the second must not panic either way.
        let _ = try_init_telemetry(&config);
        assert!(!try_init_telemetry(&config));
    }
}
