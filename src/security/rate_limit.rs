//! Per-identity fixed-window admission.
//!
//! Each caller identity (the API key header) owns one [`RateWindow`]. The
//! window starts at the identity's first request, not on a wall-clock minute,
//! so two callers are phased independently.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::request::request_id;
use crate::observability::metrics;

/// Counter series for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests counted in this window, denied ones included.
    pub count: u64,
    /// When this window began.
    pub window_start: Instant,
}

impl RateWindow {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }
}

/// Concurrent window map keyed by identity.
///
/// Sharded, so updates to different identities rarely share a lock.
pub type WindowStore = Arc<DashMap<String, RateWindow>>;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No identity, or a blank one.
    MissingCredential,
    /// Window count went past the limit.
    RateLimitExceeded { retry_after: Duration },
}

/// Admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Fixed-window rate limiter keyed by caller identity.
pub struct AdmissionGate {
    store: WindowStore,
    clock: Arc<dyn Clock>,
    enabled: bool,
    limit: u64,
    window: Duration,
    evict_after: Duration,
}

impl AdmissionGate {
    /// Create a gate with its own store and the system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(DashMap::new()), Arc::new(SystemClock))
    }

    /// Create a gate over an existing store and clock.
    pub fn with_store(config: &RateLimitConfig, store: WindowStore, clock: Arc<dyn Clock>) -> Self {
        let window = config.window();
        Self {
            store,
            clock,
            enabled: config.enabled,
            limit: config.requests_per_window,
            window,
            evict_after: window.saturating_mul(config.evict_after_windows.max(1)),
        }
    }

    /// Admit or deny one request from `identity`.
    ///
    /// The read-check-update runs while holding the entry's shard lock, so
    /// two concurrent callers can never both take the last slot.
    pub fn admit(&self, identity: &str) -> Decision {
        if !self.enabled {
            return Decision::Allow;
        }

        let now = self.clock.now();
        let window = match self.store.entry(identity.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get_mut();
                if current.is_expired(now, self.window) {
                    *current = RateWindow::fresh(now);
                } else {
                    current.count = current.count.saturating_add(1);
                }
                *current
            }
            Entry::Vacant(entry) => *entry.insert(RateWindow::fresh(now)),
        };

        if window.count <= self.limit {
            Decision::Allow
        } else {
            let elapsed = now.saturating_duration_since(window.window_start);
            Decision::Deny(DenyReason::RateLimitExceeded {
                retry_after: self.window.saturating_sub(elapsed),
            })
        }
    }

    /// Admit a request given the raw identity header, if any.
    ///
    /// Missing or blank identities are refused before the store is touched.
    pub fn admit_request(&self, identity: Option<&str>) -> Decision {
        match identity.map(str::trim) {
            Some(id) if !id.is_empty() => self.admit(id),
            _ => Decision::Deny(DenyReason::MissingCredential),
        }
    }

    /// Current window for `identity`, if one is tracked.
    pub fn window(&self, identity: &str) -> Option<RateWindow> {
        self.store.get(identity).map(|w| *w)
    }

    /// Number of identities with a tracked window.
    pub fn tracked_identities(&self) -> usize {
        self.store.len()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window_length(&self) -> Duration {
        self.window
    }

    /// Drop windows that started more than `evict_after_windows` windows ago.
    ///
    /// Such a window is already expired, so removing it cannot change any
    /// later decision. Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.store.len();
        self.store
            .retain(|_, w| now.saturating_duration_since(w.window_start) <= self.evict_after);
        let removed = before.saturating_sub(self.store.len());
        metrics::record_tracked_identities(self.store.len());
        removed
    }
}

/// Request state for [`admission_middleware`].
#[derive(Clone)]
pub struct AdmissionState {
    pub gate: Arc<AdmissionGate>,
    pub identity_header: Arc<str>,
}

/// Middleware gating a router on [`AdmissionGate::admit_request`].
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = request
        .headers()
        .get(&*state.identity_header)
        .and_then(|v| v.to_str().ok());

    match state.gate.admit_request(identity) {
        Decision::Allow => {
            metrics::record_admission("allowed");
            next.run(request).await
        }
        Decision::Deny(DenyReason::MissingCredential) => {
            tracing::warn!(
                request_id = %request_id(&request),
                path = %request.uri().path(),
                "Rejected request without API key"
            );
            metrics::record_admission("missing_credential");
            GatewayError::MissingCredential.into_response()
        }
        Decision::Deny(DenyReason::RateLimitExceeded { retry_after }) => {
            tracing::warn!(
                request_id = %request_id(&request),
                client = identity.unwrap_or_default(),
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            metrics::record_admission("rate_limited");
            let mut response = GatewayError::RateLimitExceeded { retry_after }.into_response();
            // Round up so clients never retry inside the current window.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
