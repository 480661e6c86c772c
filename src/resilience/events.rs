//! Circuit breaker events and observers.
//!
//! Breakers collect events while holding their lock and hand them to the
//! observer only after releasing it. A panicking observer is contained in
//! [`dispatch`], so monitoring can never wedge or corrupt a breaker.

use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Phase of the call-protection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitPhase {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitPhase::Closed => "CLOSED",
            CircuitPhase::Open => "OPEN",
            CircuitPhase::HalfOpen => "HALF_OPEN",
        }
    }

    /// Numeric value exported on the state gauge.
    pub fn gauge_value(self) -> u8 {
        match self {
            CircuitPhase::Closed => 0,
            CircuitPhase::Open => 1,
            CircuitPhase::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a breaker (or the registry) did.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitEvent {
    /// A breaker was created for a new call name.
    EntryAdded { name: String },
    StateTransition {
        name: String,
        from: CircuitPhase,
        to: CircuitPhase,
    },
    Success { name: String, elapsed: Duration },
    /// A failure that counts against the circuit.
    Error {
        name: String,
        error: String,
        elapsed: Duration,
    },
    /// A failure that does not count (e.g. a 4xx from the downstream).
    IgnoredError {
        name: String,
        error: String,
        elapsed: Duration,
    },
    /// Refused because the circuit is open or the half-open trials are taken.
    CallNotPermitted { name: String },
    /// Forced back to Closed from the outside.
    Reset { name: String },
}

impl CircuitEvent {
    pub fn name(&self) -> &str {
        match self {
            CircuitEvent::EntryAdded { name }
            | CircuitEvent::StateTransition { name, .. }
            | CircuitEvent::Success { name, .. }
            | CircuitEvent::Error { name, .. }
            | CircuitEvent::IgnoredError { name, .. }
            | CircuitEvent::CallNotPermitted { name }
            | CircuitEvent::Reset { name } => name,
        }
    }
}

/// Receives every breaker event synchronously.
pub trait CircuitObserver: Send + Sync {
    fn on_event(&self, event: &CircuitEvent);
}

/// Deliver `events` in order, containing observer panics.
pub(crate) fn dispatch(observer: &dyn CircuitObserver, events: Vec<CircuitEvent>) {
    for event in events {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(&event)));
        if delivered.is_err() {
            tracing::error!(circuit = event.name(), event = ?event, "Circuit observer panicked; event dropped");
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CircuitObserver for NoopObserver {
    fn on_event(&self, _event: &CircuitEvent) {}
}

/// Logs events through `tracing`.
///
/// Transitions at info, refusals and counted errors at warn, everything
/// else at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl CircuitObserver for LoggingObserver {
    fn on_event(&self, event: &CircuitEvent) {
        match event {
            CircuitEvent::EntryAdded { name } => {
                tracing::info!(circuit = %name, "New circuit breaker registered");
            }
            CircuitEvent::StateTransition { name, from, to } => {
                tracing::info!(circuit = %name, from = %from, to = %to, "Circuit breaker state changed");
            }
            CircuitEvent::CallNotPermitted { name } => {
                tracing::warn!(circuit = %name, "Circuit breaker call not permitted");
            }
            CircuitEvent::Error { name, error, elapsed } => {
                tracing::warn!(
                    circuit = %name,
                    error = %error,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Circuit breaker recorded an error"
                );
            }
            CircuitEvent::Success { name, elapsed } => {
                tracing::debug!(
                    circuit = %name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Circuit breaker recorded a success"
                );
            }
            CircuitEvent::IgnoredError { name, error, elapsed } => {
                tracing::debug!(
                    circuit = %name,
                    error = %error,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Circuit breaker ignored an error"
                );
            }
            CircuitEvent::Reset { name } => {
                tracing::info!(circuit = %name, "Circuit breaker reset");
            }
        }
    }
}

/// Exports events as metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl CircuitObserver for MetricsObserver {
    fn on_event(&self, event: &CircuitEvent) {
        match event {
            CircuitEvent::StateTransition { name, from, to } => {
                metrics::record_circuit_transition(name, from.as_str(), to.as_str(), to.gauge_value());
            }
            CircuitEvent::Success { name, elapsed } => {
                metrics::record_call(name, "success", Some(*elapsed));
            }
            CircuitEvent::Error { name, elapsed, .. } => {
                metrics::record_call(name, "error", Some(*elapsed));
            }
            CircuitEvent::IgnoredError { name, elapsed, .. } => {
                metrics::record_call(name, "ignored", Some(*elapsed));
            }
            CircuitEvent::CallNotPermitted { name } => {
                metrics::record_call(name, "not_permitted", None);
            }
            CircuitEvent::EntryAdded { .. } | CircuitEvent::Reset { .. } => {}
        }
    }
}

/// Forwards each event to several observers.
///
/// Each observer is isolated: one panicking does not stop the others.
#[derive(Clone, Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn CircuitObserver>>,
}

impl FanoutObserver {
    pub fn new(observers: Vec<Arc<dyn CircuitObserver>>) -> Self {
        Self { observers }
    }

    pub fn with(mut self, observer: Arc<dyn CircuitObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl CircuitObserver for FanoutObserver {
    fn on_event(&self, event: &CircuitEvent) {
        for observer in &self.observers {
            dispatch(observer.as_ref(), vec![event.clone()]);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{PanickingObserver, RecordingObserver};
    use super::*;

    #[test]
    fn test_fanout_isolates_panicking_observer() {
        let recorder = Arc::new(RecordingObserver::default());
        let fanout = FanoutObserver::default()
            .with(Arc::new(PanickingObserver))
            .with(recorder.clone());

        dispatch(&fanout, vec![CircuitEvent::Reset { name: "mail-send".into() }]);

        assert_eq!(
            recorder.events(),
            vec![CircuitEvent::Reset { name: "mail-send".into() }]
        );
    }

    #[test]
    fn test_phase_serializes_like_display() {
        let json = serde_json::to_string(&CircuitPhase::HalfOpen).unwrap();
        assert_eq!(json, "\"HALF_OPEN\"");
        assert_eq!(CircuitPhase::HalfOpen.to_string(), "HALF_OPEN");
    }
}
