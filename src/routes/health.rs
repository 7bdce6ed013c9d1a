//! Health check endpoints
//!
//! - /health, /healthz - liveness probe (is the gateway running?)
//! - /ready, /readyz - readiness probe (is MongoDB reachable?)
//! - /version - deployment verification

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{json_response, FullBody};
use crate::server::AppState;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if the gateway is running)
    pub healthy: bool,
    /// Service version
    pub version: &'static str,
    /// Operating mode
    pub mode: &'static str,
    /// Node identifier
    pub node_id: String,
    /// Whether MongoDB answered the last ping
    pub database: bool,
    /// Current timestamp
    pub timestamp: String,
}

fn build_health_response(state: &AppState, database: bool) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Liveness probe: 200 whenever the gateway is running
pub fn health_check(state: Arc<AppState>) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(&state, true))
}

/// Readiness probe: 200 only when MongoDB is reachable.
/// Use this for load-balancer health checks.
pub async fn readiness_check(state: Arc<AppState>) -> Response<FullBody> {
    let database = state.mongo.ping().await.is_ok();
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &build_health_response(&state, database))
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub service: &'static str,
}

pub fn version_info() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            service: "medigate",
        },
    )
}
