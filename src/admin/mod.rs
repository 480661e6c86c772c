pub mod handlers;
pub mod auth;

use axum::{
    routing::{get, post},
    Router,
    middleware,
};
use crate::http::server::AppState;
use self::handlers::*;
use self::auth::admin_auth_middleware;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/circuits/{name}/reset", post(reset_circuit))
        .route("/admin/rate-limits", get(get_rate_limits))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
