//! HTTP route handlers
//!
//! Handlers are plain hyper functions dispatched from `server::http`.
//! Shared helpers here map core errors onto the wire: verification
//! failures become 401, policy denials 403, store outages 503.

pub mod dashboard;
pub mod health;
pub mod hospitals;
pub mod notifications;
pub mod predictions;
pub mod records;
pub mod users;

pub use dashboard::handle_dashboard_request;
pub use health::{health_check, readiness_check, version_info};
pub use hospitals::handle_hospitals_request;
pub use notifications::handle_notification_request;
pub use predictions::{handle_prediction_request, handle_predict_proxy};
pub use records::handle_record_request;
pub use users::handle_user_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::auth::{extract_token_from_header, Decision, GateError, PolicyAction};
use crate::server::AppState;

pub(crate) type FullBody = Full<Bytes>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Success response body for mutations that return a message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    code: Option<&str>,
) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(|c| c.to_string()),
        },
    )
}

pub(crate) fn message_response(message: String) -> Response<FullBody> {
    json_response(StatusCode::OK, &MessageResponse { message })
}

/// Read and deserialize a JSON request body, or produce a 400
pub(crate) async fn read_json_body<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<FullBody>> {
    let body = req.collect().await.map_err(|e| {
        warn!("Failed to read request body: {}", e);
        error_response(
            StatusCode::BAD_REQUEST,
            "Failed to read request body",
            Some("BAD_BODY"),
        )
    })?;

    serde_json::from_slice(&body.to_bytes()).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid JSON: {e}"),
            Some("BAD_JSON"),
        )
    })
}

/// Bearer token from the Authorization header
pub(crate) fn bearer_token(req: &Request<Incoming>) -> Option<&str> {
    extract_token_from_header(
        req.headers()
            .get(hyper::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Map a gate error to its wire response
pub(crate) fn gate_error_response(err: GateError) -> Response<FullBody> {
    match err {
        GateError::InvalidCredential(reason) => {
            warn!("credential rejected: {}", reason);
            error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token",
                Some("INVALID_TOKEN"),
            )
        }
        GateError::UnknownSubject(subject) => {
            warn!("verified subject without user record: {}", subject);
            error_response(
                StatusCode::UNAUTHORIZED,
                "No user record for this credential",
                Some("UNKNOWN_SUBJECT"),
            )
        }
        GateError::Store(e) => {
            warn!("role lookup failed: {}", e);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Authorization backend unavailable",
                Some("STORE_UNAVAILABLE"),
            )
        }
    }
}

/// Run the authorization gate for a request, translating every non-granted
/// outcome into its response. Handlers receive a granted [`Decision`].
///
/// `resource_owner` must come from the stored resource, never from the
/// request payload.
pub(crate) async fn require(
    req: &Request<Incoming>,
    state: &AppState,
    action: PolicyAction,
    resource_owner: Option<&str>,
) -> Result<Decision, Response<FullBody>> {
    let token = bearer_token(req).ok_or_else(|| {
        error_response(StatusCode::UNAUTHORIZED, "No token provided", Some("NO_TOKEN"))
    })?;

    let decision = state
        .gate
        .authorize(token, action, resource_owner)
        .await
        .map_err(gate_error_response)?;

    if !decision.allowed {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Access denied",
            Some("FORBIDDEN"),
        ));
    }

    Ok(decision)
}

/// 503 for database failures, logged once at the route layer
pub(crate) fn db_error_response(e: crate::types::GatewayError) -> Response<FullBody> {
    warn!("database error: {}", e);
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Database unavailable",
        Some("DB_UNAVAILABLE"),
    )
}
