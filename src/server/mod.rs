//! HTTP trigger surface
//!
//! Routes:
//! - `GET /api/v1/ping/{ids}` and `GET /api/v1/speed/{ids}` run an on-demand round
//! - `GET /metrics` exports the gauge registry
//! - `GET /health` and `GET /ready`

use crate::{
    error::{AppError, Result},
    invoker::OnDemandInvoker,
    logging::Logger,
    models::{config::split_list, RoundView},
    report::{gauge::PROMETHEUS_CONTENT_TYPE, GaugeReporter},
    types::MeasurementKind,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub invoker: OnDemandInvoker,
    pub gauges: Arc<GaugeReporter>,
    /// Deadline applied to every on-demand round
    pub request_timeout: Duration,
    pub logger: Logger,
}

/// Error body returned by every failing route
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(message) => ApiError::bad_request(message),
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.category(), other.to_string()),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/ping", get(missing_ids))
        .route("/api/v1/ping/", get(missing_ids))
        .route("/api/v1/ping/{ids}", get(ping))
        .route("/api/v1/speed", get(missing_ids))
        .route("/api/v1/speed/", get(missing_ids))
        .route("/api/v1/speed/{ids}", get(speed))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

async fn ping(State(state): State<AppState>, Path(ids): Path<String>) -> ApiResult<Json<RoundView>> {
    invoke(&state, MeasurementKind::Latency, &ids).await
}

async fn speed(State(state): State<AppState>, Path(ids): Path<String>) -> ApiResult<Json<RoundView>> {
    invoke(&state, MeasurementKind::Throughput, &ids).await
}

async fn missing_ids() -> ApiError {
    ApiError::bad_request("no targets given")
}

async fn invoke(state: &AppState, kind: MeasurementKind, ids: &str) -> ApiResult<Json<RoundView>> {
    let ids = split_list(ids);
    match state.invoker.on_demand(kind, &ids, state.request_timeout).await {
        Ok(view) => Ok(Json(view)),
        Err(e) => {
            state
                .logger
                .warn(&format!("On-demand {} request failed", kind))
                .field("ids", &ids)
                .error_info(&e)
                .log()
                .await;
            Err(e.into())
        }
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.gauges.render_prometheus(),
    )
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

async fn ready() -> impl IntoResponse {
    (StatusCode::OK, "ready")
}

/// Bind the listener on all interfaces
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::server(format!("failed to bind {}: {}", addr, e)))
}

/// Serve until `shutdown` is cancelled
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let logger = state.logger.clone();
    let addr = listener.local_addr()?;
    logger.info(&format!("HTTP server listening on http://{}", addr)).log().await;

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await
        .map_err(|e| AppError::server(format!("HTTP server error: {}", e)))?;

    logger.info("HTTP server stopped").log().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ApiError::from(AppError::validation("no latency targets given"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "VALIDATION");
    }

    #[test]
    fn test_other_errors_map_to_internal() {
        let err = ApiError::from(AppError::probe("speedtest-cli missing"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "PROBE");
        assert!(err.message.contains("speedtest-cli missing"));
    }
}
