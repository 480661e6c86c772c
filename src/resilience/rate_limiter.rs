//! Outbound permit limiter for one call name.
//!
//! Time is cut into fixed refresh periods counted from construction. Each
//! period hands out `limit_for_period` permits; once they are used up further
//! calls are refused until the next period starts. A refusal never waits and
//! never reaches the downstream.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::CallRateLimiterConfig;
use crate::error::CallError;
use crate::observability::metrics;

#[derive(Debug)]
struct Cycle {
    started: Instant,
    used: u32,
}

pub struct CallRateLimiter {
    name: String,
    config: CallRateLimiterConfig,
    clock: Arc<dyn Clock>,
    cycle: Mutex<Cycle>,
}

impl CallRateLimiter {
    pub fn new(name: impl Into<String>, config: CallRateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            name: name.into(),
            config,
            clock,
            cycle: Mutex::new(Cycle { started, used: 0 }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CallRateLimiterConfig {
        &self.config
    }

    /// Take one permit from the current period.
    pub fn try_acquire(&self) -> Result<(), CallError> {
        let now = self.clock.now();
        let mut cycle = self.cycle.lock().unwrap_or_else(|e| e.into_inner());
        self.roll(&mut cycle, now);

        if cycle.used < self.config.limit_for_period {
            cycle.used += 1;
            return Ok(());
        }
        drop(cycle);

        tracing::debug!(
            call = %self.name,
            limit_for_period = self.config.limit_for_period,
            "Outbound call not permitted"
        );
        metrics::record_call_not_permitted(&self.name);
        Err(CallError::RequestNotPermitted {
            name: self.name.clone(),
        })
    }

    /// Permits still available in the current period.
    pub fn available_permits(&self) -> u32 {
        let now = self.clock.now();
        let mut cycle = self.cycle.lock().unwrap_or_else(|e| e.into_inner());
        self.roll(&mut cycle, now);
        self.config.limit_for_period.saturating_sub(cycle.used)
    }

    /// Move to the period containing `now`, keeping period boundaries aligned.
    fn roll(&self, cycle: &mut Cycle, now: Instant) {
        let period = self.config.limit_refresh_period().as_nanos();
        if period == 0 {
            return;
        }
        let elapsed = now.saturating_duration_since(cycle.started).as_nanos();
        if elapsed < period {
            return;
        }
        let into_period = Duration::from_nanos((elapsed % period) as u64);
        cycle.started = now.checked_sub(into_period).unwrap_or(now);
        cycle.used = 0;
    }
}
