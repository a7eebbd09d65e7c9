//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit `tracing` events; binaries and
//! tests call [`init_tracing`] once to get them printed.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins over `config.level` when set.
///
/// # Errors
/// Invalid filter directives, or a subscriber already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::invalid("logging.level", e.to_string()))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ConfigError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_fails() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ansi: false,
            ..LoggingConfig::default()
        };
        // another test may have installed one already; either way the
        // second call must report it
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(ConfigError::Telemetry(_))));
    }
}
