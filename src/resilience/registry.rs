//! Lazily populated table of circuit breakers, one per call name.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ResilienceConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::resilience::events::{dispatch, CircuitEvent, CircuitObserver};
use crate::resilience::rate_limiter::CallRateLimiter;

pub struct CircuitRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    /// Fixed at construction: only configured instances are limited.
    limiters: HashMap<String, Arc<CallRateLimiter>>,
    config: ResilienceConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CircuitObserver>,
}

impl CircuitRegistry {
    pub fn new(config: ResilienceConfig, observer: Arc<dyn CircuitObserver>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), observer)
    }

    pub fn with_clock(
        config: ResilienceConfig,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn CircuitObserver>,
    ) -> Self {
        let limiters = config
            .instances
            .iter()
            .filter_map(|(name, instance)| {
                let limiter = instance.rate_limiter.clone()?;
                Some((
                    name.clone(),
                    Arc::new(CallRateLimiter::new(name.as_str(), limiter, Arc::clone(&clock))),
                ))
            })
            .collect();

        Self {
            breakers: DashMap::new(),
            limiters,
            config,
            clock,
            observer,
        }
    }

    /// Breaker for `name`, created on first use with the instance override
    /// or the default settings.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let (breaker, created) = match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let breaker = Arc::new(CircuitBreaker::new(
                    name,
                    self.config.breaker_for(name).clone(),
                    Arc::clone(&self.clock),
                    Arc::clone(&self.observer),
                ));
                entry.insert(Arc::clone(&breaker));
                (breaker, true)
            }
        };

        if created {
            dispatch(
                self.observer.as_ref(),
                vec![CircuitEvent::EntryAdded {
                    name: name.to_string(),
                }],
            );
        }
        breaker
    }

    /// Outbound limiter for `name`, if its instance configures one.
    pub fn limiter(&self, name: &str) -> Option<&Arc<CallRateLimiter>> {
        self.limiters.get(name)
    }

    /// Breaker for `name` if one has been created.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Snapshots of every known breaker, ordered by name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|b| Arc::clone(b.value())).collect();
        let mut snapshots: Vec<CircuitSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{CallRateLimiterConfig, CircuitBreakerConfig, InstanceConfig};
    use crate::resilience::events::testing::RecordingObserver;

    #[test]
    fn test_breaker_created_once_per_name() {
        let observer = Arc::new(RecordingObserver::default());
        let registry = CircuitRegistry::new(ResilienceConfig::default(), observer.clone());

        let a = registry.breaker("payment-process");
        let b = registry.breaker("payment-process");
        assert!(Arc::ptr_eq(&a, &b));
        registry.breaker("mail-send");

        let added: Vec<_> = observer
            .events()
            .into_iter()
            .filter(|e| matches!(e, CircuitEvent::EntryAdded { .. }))
            .collect();
        assert_eq!(added.len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_instance_override_applies() {
        let mut config = ResilienceConfig::default();
        let custom = CircuitBreakerConfig {
            sliding_window_size: 3,
            minimum_number_of_calls: 3,
            ..CircuitBreakerConfig::default()
        };
        config.instances.insert("mail-send".into(), custom.clone().into());
        let registry = CircuitRegistry::with_clock(
            config,
            Arc::new(ManualClock::new()),
            Arc::new(RecordingObserver::default()),
        );

        assert_eq!(registry.breaker("mail-send").config(), &custom);
        assert_eq!(
            registry.breaker("payment-process").config(),
            &CircuitBreakerConfig::default()
        );
    }

    #[test]
    fn test_snapshots_sorted_and_get_does_not_create() {
        let registry = CircuitRegistry::new(
            ResilienceConfig::default(),
            Arc::new(RecordingObserver::default()),
        );
        assert!(registry.get("payment-process").is_none());
        registry.breaker("payment-process");
        registry.breaker("mail-send");

        let names: Vec<_> = registry.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["mail-send", "payment-process"]);
    }

    #[test]
    fn test_limiters_only_for_configured_instances() {
        let mut config = ResilienceConfig::default();
        config.instances.insert(
            "mail-send".into(),
            InstanceConfig {
                circuit_breaker: CircuitBreakerConfig::default(),
                rate_limiter: Some(CallRateLimiterConfig {
                    limit_for_period: 4,
                    limit_refresh_period_ms: 1_000,
                }),
            },
        );
        let registry = CircuitRegistry::with_clock(
            config,
            Arc::new(ManualClock::new()),
            Arc::new(RecordingObserver::default()),
        );

        let limiter = registry.limiter("mail-send").unwrap();
        assert_eq!(limiter.name(), "mail-send");
        assert_eq!(limiter.available_permits(), 4);
        assert!(registry.limiter("payment-process").is_none());
        // Limiters do not create breakers.
        assert!(registry.is_empty());
    }
}
