//! `AdminServer`: Axum HTTP surface for operators.

use std::sync::Arc;
use std::time::Instant;

use ananya_runtime::AdminService;
use ananya_settings::ServerSettings;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::admin::{self, ApiError};
use crate::health::{self, HealthResponse};
use crate::metrics::ADMIN_REQUESTS_TOTAL;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Operator operations.
    pub admin: Arc<AdminService>,
    /// Bearer token for `/admin`. `None` disables the admin API.
    pub admin_token: Option<Arc<str>>,
    /// Prometheus render handle. `None` disables `/metrics`.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// HTTP server for health, metrics, and the admin API.
pub struct AdminServer {
    host: String,
    port: u16,
    state: AppState,
}

impl AdminServer {
    /// Server bound per `settings`, exposing `admin`.
    pub fn new(settings: &ServerSettings, admin: Arc<AdminService>) -> Self {
        let admin_token = settings
            .admin_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        if admin_token.is_none() {
            warn!("no admin token configured, admin API disabled");
        }
        Self {
            host: settings.host.clone(),
            port: settings.port,
            state: AppState {
                admin,
                admin_token,
                metrics: None,
                start_time: Instant::now(),
            },
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let admin = admin::routes().route_layer(middleware::from_fn_with_state(self.state.clone(), require_admin));

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .nest("/admin", admin)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `token` is cancelled.
    pub async fn serve(self, listener: TcpListener, token: CancellationToken) -> std::io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "admin server listening");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(token.cancelled_owned())
            .await?;
        info!("admin server stopped");
        Ok(())
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.admin.dispatcher().active_jobs();
    Json(health::health_check(state.start_time, active))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Bearer-token gate for `/admin`.
async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());

    let Some(expected) = state.admin_token.as_deref() else {
        return ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "ADMIN_DISABLED", "admin API is not configured")
            .into_response();
    };
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if !presented.is_some_and(|token| tokens_match(token.trim(), expected)) {
        warn!(route = %route, "rejected admin request");
        return ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing or invalid admin token").into_response();
    }

    let response = next.run(req).await;
    counter!(ADMIN_REQUESTS_TOTAL, "route" => route, "status" => response.status().as_u16().to_string()).increment(1);
    response
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
