//! Protected call execution.
//!
//! ```text
//! call(name, deadline, f)
//!     → registry.breaker(name).try_acquire()   refused → CallRefused
//!     → registry.limiter(name).try_acquire()   refused → RequestNotPermitted
//!     → timeout(deadline, f())                  elapsed → CallTimeout   (counted)
//!         Ok                                    → success               (counted)
//!         Err(5xx | transport)                  → Downstream            (counted)
//!         Err(4xx)                              → Downstream            (ignored)
//! execute(...) = call(...) then, on any CallError, fallback(input, &error)
//! ```
//!
//! Each attempt is recorded on its breaker exactly once. A limiter refusal
//! drops the breaker permit unrecorded. The future passed in is dropped on
//! timeout, which cancels the in-flight request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use crate::error::{CallError, DownstreamError, FallbackExhausted};
use crate::resilience::registry::CircuitRegistry;

#[derive(Clone)]
pub struct ProtectedCallExecutor {
    registry: Arc<CircuitRegistry>,
}

impl ProtectedCallExecutor {
    pub fn new(registry: Arc<CircuitRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    /// Run `call` under the breaker for `name` with a hard deadline.
    pub async fn call<T, F, Fut>(&self, name: &str, deadline: Duration, call: F) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DownstreamError>>,
    {
        let permit = self.registry.breaker(name).try_acquire()?;
        if let Some(limiter) = self.registry.limiter(name) {
            limiter.try_acquire()?;
        }

        match time::timeout(deadline, call()).await {
            Ok(Ok(value)) => {
                permit.record_success();
                Ok(value)
            }
            Ok(Err(source)) => {
                if source.is_recordable() {
                    permit.record_failure(source.to_string());
                } else {
                    permit.record_ignored(source.to_string());
                }
                Err(CallError::Downstream {
                    name: name.to_string(),
                    source,
                })
            }
            Err(_) => {
                permit.record_failure(format!("timed out after {}ms", deadline.as_millis()));
                Err(CallError::CallTimeout {
                    name: name.to_string(),
                    deadline,
                })
            }
        }
    }

    /// Like [`call`](Self::call), but any failure is handed to `fallback`
    /// together with the original input.
    ///
    /// The fallback either substitutes a value or gives up with
    /// [`FallbackExhausted`], which surfaces as
    /// [`CallError::FallbackExhausted`] carrying the original failure.
    pub async fn execute<I, T, F, Fut, Fb>(
        &self,
        name: &str,
        deadline: Duration,
        input: I,
        call: F,
        fallback: Fb,
    ) -> Result<T, CallError>
    where
        I: Clone,
        F: FnOnce(I) -> Fut,
        Fut: Future<Output = Result<T, DownstreamError>>,
        Fb: FnOnce(I, &CallError) -> Result<T, FallbackExhausted>,
    {
        let retained = input.clone();
        let cause = match self.call(name, deadline, move || call(input)).await {
            Ok(value) => return Ok(value),
            Err(cause) => cause,
        };

        tracing::warn!(
            circuit = %name,
            kind = cause.kind(),
            error = %cause,
            "Fallback activated"
        );

        fallback(retained, &cause).map_err(|exhausted| CallError::FallbackExhausted {
            name: name.to_string(),
            reason: exhausted.reason,
            cause: Box::new(cause),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{CallRateLimiterConfig, CircuitBreakerConfig, ResilienceConfig};
    use crate::resilience::events::testing::RecordingObserver;
    use crate::resilience::events::{CircuitEvent, CircuitPhase};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEADLINE: Duration = Duration::from_secs(1);

    fn executor(window: usize) -> (ProtectedCallExecutor, Arc<ManualClock>, Arc<RecordingObserver>) {
        let config = ResilienceConfig {
            circuit_breaker: CircuitBreakerConfig {
                sliding_window_size: window,
                minimum_number_of_calls: window,
                failure_rate_threshold: 50.0,
                wait_duration_in_open_state_ms: 10_000,
                permitted_calls_in_half_open_state: 1,
            },
            ..ResilienceConfig::default()
        };
        let clock = Arc::new(ManualClock::new());
        let observer = Arc::new(RecordingObserver::default());
        let registry = CircuitRegistry::with_clock(config, clock.clone(), observer.clone());
        (ProtectedCallExecutor::new(Arc::new(registry)), clock, observer)
    }

    async fn hang() -> Result<(), DownstreamError> {
        time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    fn counted(observer: &RecordingObserver) -> (usize, usize, usize) {
        let events = observer.events();
        let count = |f: fn(&CircuitEvent) -> bool| events.iter().filter(|e| f(e)).count();
        (
            count(|e| matches!(e, CircuitEvent::Success { .. })),
            count(|e| matches!(e, CircuitEvent::Error { .. })),
            count(|e| matches!(e, CircuitEvent::IgnoredError { .. })),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_value_through() {
        let (exec, _, observer) = executor(3);
        let value = exec
            .call("payment-process", DEADLINE, || async { Ok::<_, DownstreamError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(counted(&observer), (1, 0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_and_counted_once() {
        let (exec, _, observer) = executor(3);
        let err = exec.call("mail-send", DEADLINE, hang).await.unwrap_err();
        assert_eq!(
            err,
            CallError::CallTimeout {
                name: "mail-send".into(),
                deadline: DEADLINE
            }
        );
        assert_eq!(counted(&observer), (0, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_downstream_error_carries_payload() {
        let (exec, _, observer) = executor(3);
        let err = exec
            .call("payment-process", DEADLINE, || async {
                Err::<(), _>(DownstreamError::status(500, "ledger offline"))
            })
            .await
            .unwrap_err();
        match err {
            CallError::Downstream { name, source } => {
                assert_eq!(name, "payment-process");
                assert_eq!(source, DownstreamError::status(500, "ledger offline"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(counted(&observer), (0, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_never_open_the_circuit() {
        let (exec, _, observer) = executor(3);
        for _ in 0..10 {
            let err = exec
                .call("payment-process", DEADLINE, || async {
                    Err::<(), _>(DownstreamError::status(422, "invalid amount"))
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "downstream_error");
        }
        let breaker = exec.registry().get("payment-process").unwrap();
        assert_eq!(breaker.phase(), CircuitPhase::Closed);
        assert_eq!(counted(&observer), (0, 0, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits_to_fallback() {
        let (exec, _, _) = executor(3);
        let attempts = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let attempts = attempts.clone();
            let result = exec
                .execute(
                    "mail-send",
                    DEADLINE,
                    "user@example.com".to_string(),
                    move |_email| {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        hang()
                    },
                    |_email, cause| {
                        assert_eq!(cause.kind(), "call_timeout");
                        Ok(())
                    },
                )
                .await;
            assert!(result.is_ok());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_in_fallback = seen.clone();
        let attempts_in_call = attempts.clone();
        exec.execute(
            "mail-send",
            DEADLINE,
            "user@example.com".to_string(),
            move |_email| {
                attempts_in_call.fetch_add(1, Ordering::SeqCst);
                hang()
            },
            move |email, cause| {
                *seen_in_fallback.lock().unwrap() = Some((email, cause.clone()));
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3, "downstream must not be contacted");
        let (email, cause) = seen.lock().unwrap().take().unwrap();
        assert_eq!(email, "user@example.com");
        assert_eq!(
            cause,
            CallError::CallRefused {
                name: "mail-send".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_substitutes_result() {
        let (exec, _, _) = executor(3);
        let value = exec
            .execute(
                "payment-process",
                DEADLINE,
                7u32,
                |_n| async { Err::<u32, _>(DownstreamError::transport("connection refused")) },
                |n, _cause| Ok(n * 2),
            )
            .await
            .unwrap();
        assert_eq!(value, 14);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_exhausted_keeps_cause() {
        let (exec, _, _) = executor(3);
        let err = exec
            .execute(
                "mail-send",
                DEADLINE,
                (),
                |_| hang(),
                |_, _| Err::<(), _>(FallbackExhausted::new("Mail service temporarily unavailable")),
            )
            .await
            .unwrap_err();

        match err {
            CallError::FallbackExhausted { name, reason, cause } => {
                assert_eq!(name, "mail-send");
                assert_eq!(reason, "Mail service temporarily unavailable");
                assert_eq!(cause.kind(), "call_timeout");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_cooldown() {
        let (exec, clock, _) = executor(3);
        for _ in 0..3 {
            let _ = exec.call("mail-send", DEADLINE, hang).await;
        }
        let err = exec
            .call("mail-send", DEADLINE, || async { Ok::<_, DownstreamError>(()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "call_refused");

        clock.advance(Duration::from_secs(10));
        exec.call("mail-send", DEADLINE, || async { Ok::<_, DownstreamError>(()) })
            .await
            .unwrap();
        assert_eq!(
            exec.registry().get("mail-send").unwrap().phase(),
            CircuitPhase::Closed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_call_goes_to_fallback_without_downstream() {
        let mut config = ResilienceConfig::default();
        config.instances.insert(
            "mail-send".into(),
            crate::config::InstanceConfig {
                circuit_breaker: CircuitBreakerConfig::default(),
                rate_limiter: Some(CallRateLimiterConfig {
                    limit_for_period: 2,
                    limit_refresh_period_ms: 1_000,
                }),
            },
        );
        let clock = Arc::new(ManualClock::new());
        let observer = Arc::new(RecordingObserver::default());
        let exec = ProtectedCallExecutor::new(Arc::new(CircuitRegistry::with_clock(
            config,
            clock.clone(),
            observer.clone(),
        )));

        let attempts = Arc::new(AtomicUsize::new(0));
        let send = |exec: ProtectedCallExecutor, attempts: Arc<AtomicUsize>| async move {
            exec.execute(
                "mail-send",
                DEADLINE,
                "user@example.com".to_string(),
                move |_email| async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DownstreamError>("sent".to_string())
                },
                |_email, cause| match cause {
                    CallError::RequestNotPermitted { .. } => Ok("queued".to_string()),
                    _ => Err(FallbackExhausted::new("Mail service temporarily unavailable")),
                },
            )
            .await
        };

        assert_eq!(send(exec.clone(), attempts.clone()).await.unwrap(), "sent");
        assert_eq!(send(exec.clone(), attempts.clone()).await.unwrap(), "sent");
        assert_eq!(send(exec.clone(), attempts.clone()).await.unwrap(), "queued");
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "downstream must not be contacted");

        // The refusal leaves the breaker untouched.
        assert_eq!(counted(&observer), (2, 0, 0));
        let snapshot = exec.registry().get("mail-send").unwrap().snapshot();
        assert_eq!(snapshot.buffered_calls, 2);
        assert_eq!(snapshot.phase, CircuitPhase::Closed);

        let err = exec
            .call("mail-send", DEADLINE, || async { Ok::<_, DownstreamError>(()) })
            .await
            .unwrap_err();
        assert_eq!(err, CallError::RequestNotPermitted { name: "mail-send".into() });

        clock.advance(Duration::from_secs(1));
        assert_eq!(send(exec.clone(), attempts.clone()).await.unwrap(), "sent");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
