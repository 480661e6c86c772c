use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use crate::http::server::AppState;
use crate::resilience::CircuitSnapshot;

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub requests_per_window: u64,
    pub window_secs: u64,
    pub tracked_identities: usize,
}

pub async fn get_circuits(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.registry.snapshots())
}

/// Force a known circuit back to Closed.
pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CircuitSnapshot>, StatusCode> {
    let breaker = state.registry.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    breaker.reset();
    tracing::info!(circuit = %name, "Circuit reset via admin API");
    Ok(Json(breaker.snapshot()))
}

pub async fn get_rate_limits(State(state): State<AppState>) -> Json<RateLimitStatus> {
    let config = &state.config.rate_limit;
    Json(RateLimitStatus {
        enabled: config.enabled,
        requests_per_window: state.gate.limit(),
        window_secs: state.gate.window_length().as_secs(),
        tracked_identities: state.gate.tracked_identities(),
    })
}
