//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, limits, timeout, metrics)
//! - Gate `/payments/*` behind the admission middleware
//! - Mount the admin API when enabled
//! - Run the window sweeper alongside the server
//! - Serve until shutdown is signalled

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::downstream::{build_http_client, DownstreamClient};
use crate::http::handlers::{health, process_payment};
use crate::http::request::MakeRequestUuid;
use crate::mail::MailClient;
use crate::observability::metrics;
use crate::payments::{PaymentClient, PaymentService};
use crate::resilience::{
    CircuitObserver, CircuitRegistry, FanoutObserver, LoggingObserver, MetricsObserver,
    ProtectedCallExecutor,
};
use crate::security::{admission_middleware, AdmissionGate, AdmissionState, WindowSweeper};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub registry: Arc<CircuitRegistry>,
    pub payments: PaymentService,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Wire all subsystems from configuration.
    pub fn from_config(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let observer: Arc<dyn CircuitObserver> = Arc::new(
            FanoutObserver::default()
                .with(Arc::new(LoggingObserver))
                .with(Arc::new(MetricsObserver)),
        );
        let registry = Arc::new(CircuitRegistry::new(config.resilience.clone(), observer));
        let gate = Arc::new(AdmissionGate::new(&config.rate_limit));
        Self::with_parts(config, gate, registry)
    }

    /// Wire the downstream clients around an existing gate and registry.
    pub fn with_parts(
        config: GatewayConfig,
        gate: Arc<AdmissionGate>,
        registry: Arc<CircuitRegistry>,
    ) -> Result<Self, reqwest::Error> {
        let http = build_http_client()?;
        let executor = ProtectedCallExecutor::new(registry.clone());

        let downstream = &config.downstream;
        let payments = PaymentClient::new(
            DownstreamClient::new(http.clone(), &downstream.payment.base_url),
            executor.clone(),
            downstream.payment.deadline(),
        );
        let mail = MailClient::new(
            DownstreamClient::new(http, &downstream.mail.base_url),
            executor,
            downstream.mail.deadline(),
        );

        Ok(Self {
            gate,
            registry,
            payments: PaymentService::new(payments, mail),
            config: Arc::new(config),
        })
    }
}

/// HTTP server for the payment gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_state(AppState::from_config(config)?))
    }

    pub fn from_state(state: AppState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let admission = AdmissionState {
            gate: state.gate.clone(),
            identity_header: Arc::from(config.rate_limit.identity_header.as_str()),
        };

        let payments = Router::new()
            .route("/payments/process-mvc", post(process_payment))
            .route_layer(middleware::from_fn_with_state(admission, admission_middleware));

        let mut router = Router::new()
            .route("/health", get(health))
            .merge(payments)
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state));
        }

        router
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, e.g. for driving with `oneshot`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let rate_limit = &self.state.config.rate_limit;
        let sweeper = if rate_limit.enabled {
            let sweeper = WindowSweeper::new(
                self.state.gate.clone(),
                Duration::from_secs(rate_limit.sweep_interval_secs),
            );
            Some(tokio::spawn(sweeper.run(shutdown.resubscribe())))
        } else {
            None
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Window sweeper task failed");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
