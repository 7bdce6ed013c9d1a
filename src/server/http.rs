//! HTTP server and request router
//!
//! Accepts connections on the configured listen address and dispatches
//! requests to the route handlers by method and path prefix.

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::AuthGate;
use crate::config::Args;
use crate::db::MongoClient;
use crate::idgen::SequentialIdAllocator;
use crate::routes;
use crate::types::{GatewayError, Result};

/// Shared state handed to every request handler
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    pub gate: Arc<AuthGate>,
    pub allocator: Arc<SequentialIdAllocator>,
    pub http: reqwest::Client,
}

/// Run the HTTP server until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.args.listen;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Config(format!("Failed to bind {addr}: {e}")))?;

    info!("listening on http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, hyper::Error>(handle_request(req, state).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(peer = %peer, "connection error: {}", e);
            }
        });
    }
}

/// Route a request to its handler
async fn handle_request(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "request");

    let response = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => preflight(),
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            routes::health_check(state.clone())
        }
        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => {
            routes::readiness_check(state.clone()).await
        }
        (&Method::GET, "/version") => routes::version_info(),
        (_, p) if p == "/user" || p.starts_with("/user/") => {
            routes::handle_user_request(req, state, &path).await
        }
        (_, p) if p == "/medrec" || p.starts_with("/medrec/") => {
            routes::handle_record_request(req, state, &path).await
        }
        (_, p) if p == "/prediction" || p.starts_with("/prediction/") => {
            routes::handle_prediction_request(req, state, &path).await
        }
        (_, p) if p.starts_with("/predict/") => {
            routes::handle_predict_proxy(req, state, &path).await
        }
        (_, p) if p == "/notification" || p.starts_with("/notification/") => {
            routes::handle_notification_request(req, state, &path).await
        }
        (_, p) if p.starts_with("/dashboard") => {
            routes::handle_dashboard_request(req, state, &path).await
        }
        (_, p) if p.starts_with("/map/") => {
            routes::handle_hospitals_request(req, state, &path).await
        }
        _ => not_found(),
    };

    with_cors(response)
}

fn preflight() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            error!("failed to build preflight response: {}", e);
            Response::new(Full::new(Bytes::new()))
        })
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(
            r#"{"error":"Not found","code":"NOT_FOUND"}"#,
        )))
        .unwrap_or_else(|e| {
            error!("failed to build not-found response: {}", e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Stamp permissive CORS headers for the mobile clients
fn with_cors(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        hyper::header::HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        hyper::header::HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        hyper::header::HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_is_no_content() {
        let resp = preflight();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn cors_headers_are_stamped() {
        let resp = with_cors(not_found());
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
