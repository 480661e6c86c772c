//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_config(
            r#"
            [rate_limit]
            requests_per_window = 0
            window_secs = 0
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        assert!(matches!(
            parse_config("[rate_limit\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = parse_config(include_str!("../../gateway.toml")).unwrap();
        let mail = config.resilience.breaker_for("mail-send");
        assert_eq!(mail.sliding_window_size, 3);
        // Unset override fields fall back to the built-in defaults.
        assert_eq!(mail.permitted_calls_in_half_open_state, 3);
        let limiter = config.resilience.rate_limiter_for("mail-send").unwrap();
        assert_eq!(limiter.limit_for_period, 10);
        assert!(config.resilience.rate_limiter_for("payment-process").is_none());
        assert_eq!(config.downstream.payment.timeout_ms, 15_000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
