//! Configuration validation.
//!
//! Serde handles the syntax; this checks value ranges and URLs. All problems
//! are reported at once rather than stopping at the first.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{
    CallRateLimiterConfig, CircuitBreakerConfig, EndpointConfig, GatewayConfig, PLACEHOLDER_ADMIN_KEY,
};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    let rl = &config.rate_limit;
    if rl.identity_header.trim().is_empty() {
        errors.push(ValidationError::new("rate_limit.identity_header", "must not be blank"));
    }
    if rl.requests_per_window == 0 {
        errors.push(ValidationError::new("rate_limit.requests_per_window", "must be > 0"));
    }
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be > 0"));
    }
    if rl.evict_after_windows == 0 {
        errors.push(ValidationError::new("rate_limit.evict_after_windows", "must be > 0"));
    }

    validate_breaker("resilience.circuit_breaker", &config.resilience.circuit_breaker, &mut errors);
    for (name, instance) in &config.resilience.instances {
        let prefix = format!("resilience.instances.{}", name);
        validate_breaker(&prefix, &instance.circuit_breaker, &mut errors);
        if let Some(limiter) = &instance.rate_limiter {
            validate_rate_limiter(&format!("{}.rate_limiter", prefix), limiter, &mut errors);
        }
    }

    validate_endpoint("downstream.mail", &config.downstream.mail, &mut errors);
    validate_endpoint("downstream.payment", &config.downstream.payment, &mut errors);

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if config.admin.enabled {
        let key = config.admin.api_key.trim();
        if key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
        } else if key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "still the shipped placeholder; set a real key",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(prefix: &str, cb: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::new(
            format!("{}.failure_rate_threshold", prefix),
            "must be in (0, 100]",
        ));
    }
    if cb.sliding_window_size == 0 {
        errors.push(ValidationError::new(
            format!("{}.sliding_window_size", prefix),
            "must be > 0",
        ));
    }
    if cb.minimum_number_of_calls == 0 || cb.minimum_number_of_calls > cb.sliding_window_size {
        errors.push(ValidationError::new(
            format!("{}.minimum_number_of_calls", prefix),
            "must be between 1 and sliding_window_size",
        ));
    }
    if cb.permitted_calls_in_half_open_state == 0 {
        errors.push(ValidationError::new(
            format!("{}.permitted_calls_in_half_open_state", prefix),
            "must be > 0",
        ));
    }
}

fn validate_rate_limiter(prefix: &str, rl: &CallRateLimiterConfig, errors: &mut Vec<ValidationError>) {
    if rl.limit_for_period == 0 {
        errors.push(ValidationError::new(format!("{}.limit_for_period", prefix), "must be > 0"));
    }
    if rl.limit_refresh_period_ms == 0 {
        errors.push(ValidationError::new(
            format!("{}.limit_refresh_period_ms", prefix),
            "must be > 0",
        ));
    }
}

fn validate_endpoint(prefix: &str, endpoint: &EndpointConfig, errors: &mut Vec<ValidationError>) {
    match Url::parse(&endpoint.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            format!("{}.base_url", prefix),
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(format!("{}.base_url", prefix), e.to_string())),
    }
    if endpoint.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{}.timeout_ms", prefix), "must be > 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstanceConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.downstream.mail.base_url = "ftp://mail".into();
        config.downstream.payment.base_url = "not a url".into();
        config.resilience.circuit_breaker.failure_rate_threshold = 0.0;
        config
            .resilience
            .instances
            .insert("mail-send".into(), InstanceConfig {
                circuit_breaker: CircuitBreakerConfig {
                    minimum_number_of_calls: 20,
                    ..CircuitBreakerConfig::default()
                },
                rate_limiter: Some(CallRateLimiterConfig {
                    limit_for_period: 0,
                    ..CallRateLimiterConfig::default()
                }),
            });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"downstream.mail.base_url"));
        assert!(fields.contains(&"downstream.payment.base_url"));
        assert!(fields.contains(&"resilience.circuit_breaker.failure_rate_threshold"));
        assert!(fields.contains(&"resilience.instances.mail-send.minimum_number_of_calls"));
        assert!(fields.contains(&"resilience.instances.mail-send.rate_limiter.limit_for_period"));
    }

    #[test]
    fn test_admin_key_must_be_replaced() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "admin.api_key: still the shipped placeholder; set a real key"
        );

        config.admin.api_key = "   ".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].message, "must be set when admin is enabled");

        config.admin.api_key = "s3cret-admin-key".into();
        assert!(validate_config(&config).is_ok());

        // The placeholder is harmless while the admin API is off.
        config.admin.enabled = false;
        config.admin.api_key = PLACEHOLDER_ADMIN_KEY.into();
        assert!(validate_config(&config).is_ok());
    }
}
