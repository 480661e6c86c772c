//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Inbound admission (per API key fixed window).
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker defaults and per-call overrides.
    pub resilience: ResilienceConfig,

    /// Downstream service endpoints.
    pub downstream: DownstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one inbound request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Fixed-window rate limiting keyed by caller identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// When false every identified caller is admitted.
    pub enabled: bool,

    /// Header carrying the caller identity.
    pub identity_header: String,

    /// Requests admitted per identity per window (inclusive).
    pub requests_per_window: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// How often the sweeper looks for idle identities, in seconds.
    pub sweep_interval_secs: u64,

    /// Windows older than this many window lengths are evicted.
    pub evict_after_windows: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            identity_header: "X-API-KEY".to_string(),
            requests_per_window: 100,
            window_secs: 60,
            sweep_interval_secs: 60,
            evict_after_windows: 5,
        }
    }
}

/// Circuit breaker tuning for one protected call name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure rate in percent at or above which a closed circuit opens.
    pub failure_rate_threshold: f64,

    /// Number of most recent outcomes the failure rate is computed over.
    pub sliding_window_size: usize,

    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_number_of_calls: usize,

    /// Cool-down spent in Open before probing, in milliseconds.
    pub wait_duration_in_open_state_ms: u64,

    /// Trial calls let through while HalfOpen.
    pub permitted_calls_in_half_open_state: u32,
}

impl CircuitBreakerConfig {
    pub fn wait_duration_in_open_state(&self) -> Duration {
        Duration::from_millis(self.wait_duration_in_open_state_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            wait_duration_in_open_state_ms: 10_000,
            permitted_calls_in_half_open_state: 3,
        }
    }
}

/// Outbound permits for one call name: `limit_for_period` calls per
/// refresh period, refused once used up.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CallRateLimiterConfig {
    /// Permits handed out per refresh period.
    pub limit_for_period: u32,

    /// Length of one refresh period, in milliseconds.
    pub limit_refresh_period_ms: u64,
}

impl CallRateLimiterConfig {
    pub fn limit_refresh_period(&self) -> Duration {
        Duration::from_millis(self.limit_refresh_period_ms)
    }
}

impl Default for CallRateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 50,
            limit_refresh_period_ms: 1_000,
        }
    }
}

/// Settings for one named call.
///
/// Breaker keys sit directly in the table; the optional limiter is a
/// sub-table:
///
/// ```toml
/// [resilience.instances.mail-send]
/// sliding_window_size = 3
///
/// [resilience.instances.mail-send.rate_limiter]
/// limit_for_period = 10
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct InstanceConfig {
    #[serde(flatten)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Outbound permit limiter. Absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiter: Option<CallRateLimiterConfig>,
}

impl From<CircuitBreakerConfig> for InstanceConfig {
    fn from(circuit_breaker: CircuitBreakerConfig) -> Self {
        Self {
            circuit_breaker,
            rate_limiter: None,
        }
    }
}

/// Resilience configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Applied to every call name without an override.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per call name overrides, e.g. `[resilience.instances.mail-send]`.
    pub instances: HashMap<String, InstanceConfig>,
}

impl ResilienceConfig {
    /// Breaker settings for a call name.
    pub fn breaker_for(&self, name: &str) -> &CircuitBreakerConfig {
        self.instances
            .get(name)
            .map(|instance| &instance.circuit_breaker)
            .unwrap_or(&self.circuit_breaker)
    }

    /// Outbound limiter settings for a call name, if it has one.
    pub fn rate_limiter_for(&self, name: &str) -> Option<&CallRateLimiterConfig> {
        self.instances.get(name).and_then(|instance| instance.rate_limiter.as_ref())
    }
}

/// A downstream HTTP service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Base URL, e.g. "http://localhost:8081".
    pub base_url: String,

    /// Deadline for one call, in milliseconds.
    pub timeout_ms: u64,
}

impl EndpointConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Downstream services called by the payment handler.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    pub mail: EndpointConfig,
    pub payment: EndpointConfig,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            mail: EndpointConfig {
                base_url: "http://localhost:8081".to_string(),
                timeout_ms: 10_000,
            },
            payment: EndpointConfig {
                base_url: "http://localhost:8082".to_string(),
                timeout_ms: 15_000,
            },
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shipped admin key; refused by validation when admin is enabled.
pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin endpoints configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the /admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_ADMIN_KEY.to_string(),
        }
    }
}
