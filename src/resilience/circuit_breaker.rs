//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed unhealthy, calls are refused without contact
//! - Half-Open: a limited number of trial calls test for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open:       failure rate >= threshold over the last N outcomes
//!                      (once at least minimum_number_of_calls are buffered)
//! Open → Half-Open:    first acquisition after the cool-down
//! Half-Open → Open:    any trial failure
//! Half-Open → Closed:  permitted_calls_in_half_open_state trial successes
//! ```
//!
//! Only bookkeeping happens under the lock; the protected call itself runs
//! while the caller holds nothing but a [`CallPermit`]. Every transition bumps
//! a generation counter, and a permit issued before the latest transition
//! records nothing, so a slow call from an earlier phase cannot sway the
//! current one.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::error::CallError;
use crate::resilience::events::{dispatch, CircuitEvent, CircuitObserver, CircuitPhase};

/// Point-in-time view of one breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub phase: CircuitPhase,
    /// Failure rate in percent, `None` until enough calls are buffered.
    pub failure_rate: Option<f64>,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub consecutive_failures: u32,
    /// Remaining cool-down in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct State {
    phase: CircuitPhase,
    generation: u64,
    /// Most recent outcomes, `true` for a failure.
    outcomes: VecDeque<bool>,
    failures: usize,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trials_issued: u32,
    trial_successes: u32,
}

impl State {
    fn new() -> Self {
        Self {
            phase: CircuitPhase::Closed,
            generation: 0,
            outcomes: VecDeque::new(),
            failures: 0,
            consecutive_failures: 0,
            opened_at: None,
            trials_issued: 0,
            trial_successes: 0,
        }
    }

    fn failure_rate(&self, minimum_calls: usize) -> Option<f64> {
        if self.outcomes.is_empty() || self.outcomes.len() < minimum_calls {
            return None;
        }
        Some(self.failures as f64 * 100.0 / self.outcomes.len() as f64)
    }

    fn push_outcome(&mut self, failed: bool, window_size: usize) {
        self.outcomes.push_back(failed);
        if failed {
            self.failures += 1;
        }
        while self.outcomes.len() > window_size {
            if self.outcomes.pop_front() == Some(true) {
                self.failures -= 1;
            }
        }
    }
}

enum Outcome {
    Success,
    Failure(String),
    Ignored(String),
}

/// Per call-name circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CircuitObserver>,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn CircuitObserver>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            observer,
            state: Mutex::new(State::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Nothing panics while the lock is held; recover rather than cascade.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, st: &mut State, to: CircuitPhase, now: Instant, events: &mut Vec<CircuitEvent>) {
        let from = st.phase;
        st.phase = to;
        st.generation = st.generation.wrapping_add(1);
        st.trials_issued = 0;
        st.trial_successes = 0;
        match to {
            CircuitPhase::Open => st.opened_at = Some(now),
            CircuitPhase::HalfOpen => {}
            CircuitPhase::Closed => {
                st.outcomes.clear();
                st.failures = 0;
                st.consecutive_failures = 0;
                st.opened_at = None;
            }
        }
        events.push(CircuitEvent::StateTransition {
            name: self.name.clone(),
            from,
            to,
        });
    }

    /// Ask to make one call.
    ///
    /// Refusal records nothing: it is not evidence of a new failure.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, CallError> {
        let mut events = Vec::new();
        let now = self.clock.now();
        let acquired = {
            let mut st = self.lock();

            if st.phase == CircuitPhase::Open {
                let cooled = st.opened_at.map_or(true, |at| {
                    now.saturating_duration_since(at) >= self.config.wait_duration_in_open_state()
                });
                if cooled {
                    self.transition(&mut st, CircuitPhase::HalfOpen, now, &mut events);
                }
            }

            match st.phase {
                CircuitPhase::Closed => Some(st.generation),
                CircuitPhase::HalfOpen
                    if st.trials_issued < self.config.permitted_calls_in_half_open_state =>
                {
                    st.trials_issued += 1;
                    Some(st.generation)
                }
                _ => {
                    events.push(CircuitEvent::CallNotPermitted {
                        name: self.name.clone(),
                    });
                    None
                }
            }
        };
        dispatch(self.observer.as_ref(), events);

        match acquired {
            Some(generation) => Ok(CallPermit {
                breaker: Arc::clone(self),
                generation,
                started: now,
                recorded: false,
            }),
            None => Err(CallError::CallRefused {
                name: self.name.clone(),
            }),
        }
    }

    fn record(&self, generation: u64, started: Instant, outcome: Outcome) {
        let mut events = Vec::new();
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(started);
        let name = self.name.clone();
        events.push(match &outcome {
            Outcome::Success => CircuitEvent::Success { name, elapsed },
            Outcome::Failure(error) => CircuitEvent::Error {
                name,
                error: error.clone(),
                elapsed,
            },
            Outcome::Ignored(error) => CircuitEvent::IgnoredError {
                name,
                error: error.clone(),
                elapsed,
            },
        });

        {
            let mut st = self.lock();
            if st.generation != generation {
                tracing::debug!(
                    circuit = %self.name,
                    permit_generation = generation,
                    current_generation = st.generation,
                    "Discarding outcome from an earlier circuit phase"
                );
            } else {
                match (st.phase, outcome) {
                    (CircuitPhase::Closed, Outcome::Success) => {
                        st.consecutive_failures = 0;
                        st.push_outcome(false, self.config.sliding_window_size);
                    }
                    (CircuitPhase::Closed, Outcome::Failure(_)) => {
                        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                        st.push_outcome(true, self.config.sliding_window_size);
                        let tripped = st
                            .failure_rate(self.config.minimum_number_of_calls)
                            .is_some_and(|rate| rate >= self.config.failure_rate_threshold);
                        if tripped {
                            self.transition(&mut st, CircuitPhase::Open, now, &mut events);
                        }
                    }
                    (CircuitPhase::HalfOpen, Outcome::Success) => {
                        st.trial_successes += 1;
                        if st.trial_successes >= self.config.permitted_calls_in_half_open_state {
                            self.transition(&mut st, CircuitPhase::Closed, now, &mut events);
                        }
                    }
                    (CircuitPhase::HalfOpen, Outcome::Failure(_)) => {
                        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                        self.transition(&mut st, CircuitPhase::Open, now, &mut events);
                    }
                    (CircuitPhase::HalfOpen, Outcome::Ignored(_)) => {
                        // Give the trial slot back; it proved nothing.
                        st.trials_issued = st.trials_issued.saturating_sub(1);
                    }
                    (_, _) => {}
                }
            }
        }
        dispatch(self.observer.as_ref(), events);
    }

    fn release(&self, generation: u64) {
        let mut st = self.lock();
        if st.generation == generation && st.phase == CircuitPhase::HalfOpen {
            st.trials_issued = st.trials_issued.saturating_sub(1);
        }
    }

    /// Current phase, without applying a pending cool-down expiry.
    pub fn phase(&self) -> CircuitPhase {
        self.lock().phase
    }

    /// Force the breaker back to Closed with empty statistics.
    pub fn reset(&self) {
        let mut events = Vec::new();
        {
            let mut st = self.lock();
            let now = self.clock.now();
            if st.phase == CircuitPhase::Closed {
                st.generation = st.generation.wrapping_add(1);
                st.outcomes.clear();
                st.failures = 0;
                st.consecutive_failures = 0;
            } else {
                self.transition(&mut st, CircuitPhase::Closed, now, &mut events);
            }
            events.push(CircuitEvent::Reset {
                name: self.name.clone(),
            });
        }
        dispatch(self.observer.as_ref(), events);
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = self.clock.now();
        let st = self.lock();
        let open_remaining_ms = match (st.phase, st.opened_at) {
            (CircuitPhase::Open, Some(at)) => {
                let until = at + self.config.wait_duration_in_open_state();
                Some(until.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };
        CircuitSnapshot {
            name: self.name.clone(),
            phase: st.phase,
            failure_rate: st.failure_rate(self.config.minimum_number_of_calls),
            buffered_calls: st.outcomes.len(),
            failed_calls: st.failures,
            consecutive_failures: st.consecutive_failures,
            open_remaining_ms,
        }
    }
}

/// Permission to make one call, recorded at most once.
///
/// Dropping a permit without recording (the caller gave up) releases its
/// half-open trial slot and records nothing.
#[must_use = "a permit must be recorded or dropped"]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    started: Instant,
    recorded: bool,
}

impl CallPermit {
    pub fn record_success(mut self) {
        self.recorded = true;
        self.breaker.record(self.generation, self.started, Outcome::Success);
    }

    /// Record a failure that counts against the circuit.
    pub fn record_failure(mut self, error: impl Into<String>) {
        self.recorded = true;
        self.breaker
            .record(self.generation, self.started, Outcome::Failure(error.into()));
    }

    /// Record a failure that does not count against the circuit.
    pub fn record_ignored(mut self, error: impl Into<String>) {
        self.recorded = true;
        self.breaker
            .record(self.generation, self.started, Outcome::Ignored(error.into()));
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.release(self.generation);
        }
    }
}
