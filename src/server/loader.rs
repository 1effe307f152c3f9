//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("KUBECAST_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        .add_source(
            Environment::with_prefix("KUBECAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    with_legacy_port(builder, std::env::var("PORT").ok())?
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Honor a bare `PORT` variable, as container platforms set it.
fn with_legacy_port(
    builder: ConfigBuilder<DefaultState>,
    port: Option<String>,
) -> Result<ConfigBuilder<DefaultState>> {
    let port = port
        .map(|raw| raw.parse::<u16>())
        .transpose()
        .context("PORT must be a valid port number")?;
    builder
        .set_override_option("server.port", port.map(i64::from))
        .context("Failed to apply PORT override")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    #[test]
    fn test_embedded_defaults() {
        let config: AppConfig = defaults().build().unwrap().try_deserialize().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.broadcast.delivery_buffer, 1);
        assert_eq!(config.gateway.read_deadline_ms, 2000);
    }

    #[test]
    fn test_legacy_port_override() {
        let config: AppConfig = with_legacy_port(defaults(), Some("9097".to_string()))
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 9097);
    }

    #[test]
    fn test_invalid_legacy_port() {
        assert!(with_legacy_port(defaults(), Some("http".to_string())).is_err());
    }
}
