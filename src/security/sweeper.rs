//! Background eviction of idle rate-limit windows.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::security::rate_limit::AdmissionGate;

/// Periodically runs [`AdmissionGate::sweep_idle`] until shutdown.
pub struct WindowSweeper {
    gate: Arc<AdmissionGate>,
    interval: Duration,
}

impl WindowSweeper {
    pub fn new(gate: Arc<AdmissionGate>, interval: Duration) -> Self {
        Self { gate, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Window sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; nothing to sweep yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.gate.sweep_idle();
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            remaining = self.gate.tracked_identities(),
                            "Evicted idle rate-limit windows"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Window sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
