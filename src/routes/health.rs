use crate::error::AppError;
use crate::state::AppState;
use crate::types::ApiResponse;
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Json,
};

pub async fn welcome() -> impl IntoResponse {
    Json(ApiResponse::<()>::message("Welcome to Backend POS"))
}

// Health check endpoint - lightweight
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => {
            tracing::warn!("readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let mut snapshot = serde_json::to_value(state.metrics.get_snapshot()).unwrap_or_default();
    snapshot["rate_limited_clients"] = state.rate_limiter.tracked_clients().into();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP pos_requests_admitted Requests admitted by the rate limiter\n# TYPE pos_requests_admitted counter\npos_requests_admitted {}\n\
# HELP pos_requests_rate_limited Requests rejected by the rate limiter\n# TYPE pos_requests_rate_limited counter\npos_requests_rate_limited {}\n\
# HELP pos_requests_unauthorized Requests rejected for missing or invalid credentials\n# TYPE pos_requests_unauthorized counter\npos_requests_unauthorized {}\n\
# HELP pos_requests_forbidden Requests rejected by a role allow-list\n# TYPE pos_requests_forbidden counter\npos_requests_forbidden {}\n\
# HELP pos_panics_recovered Handler panics converted to error responses\n# TYPE pos_panics_recovered counter\npos_panics_recovered {}\n\
# HELP pos_rate_limit_clients Clients currently tracked by the rate limiter\n# TYPE pos_rate_limit_clients gauge\npos_rate_limit_clients {}\n\
# HELP pos_uptime_seconds Uptime seconds\n# TYPE pos_uptime_seconds gauge\npos_uptime_seconds {}\n",
        m.admitted,
        m.rate_limited,
        m.unauthorized,
        m.forbidden,
        m.panics_recovered,
        state.rate_limiter.tracked_clients(),
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}

pub async fn not_found(uri: Uri) -> AppError {
    tracing::debug!(path = %uri.path(), "no route");
    AppError::NotFound("Path Not Found".to_string())
}
