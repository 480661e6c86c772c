//! Route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::payments::{PaymentRequest, PaymentResponse};

/// `POST /payments/process-mvc`
pub async fn process_payment(
    State(state): State<AppState>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<PaymentResponse>, GatewayError> {
    let Json(request) = payload.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    request.validate().map_err(GatewayError::BadRequest)?;

    tracing::info!(order_id = %request.order_id, amount = request.amount, "Processing payment");
    let response = state.payments.process(request).await?;
    Ok(Json(response))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
