//! Prediction endpoints
//!
//! - `POST /prediction/add` - persist a prediction under a fresh sequential ID
//! - `GET /prediction/all` - list stored predictions
//! - `POST /predict/dengue`, `POST /predict/chikun` - proxy to the model service
//!
//! The prediction identifier comes from [`SequentialIdAllocator`], so two
//! concurrent saves can never end up with the same `pred_id`.

use bson::doc;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::PolicyAction;
use crate::db::schemas::{PredictionDoc, PREDICTION_COLLECTION};
use crate::idgen::{AllocError, PREDICTIONS};
use crate::routes::{
    db_error_response, error_response, json_response, message_response, read_json_body, require,
    FullBody,
};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionView {
    pub pred_id: String,
    pub pred_score: f64,
    pub pred_date: String,
    pub pred_disease: String,
}

impl From<&PredictionDoc> for PredictionView {
    fn from(p: &PredictionDoc) -> Self {
        Self {
            pred_id: p.pred_id.clone(),
            pred_score: p.pred_score,
            pred_date: p.pred_date.clone(),
            pred_disease: p.pred_disease.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPredictionRequest {
    pred_score: f64,
    pred_date: String,
    pred_disease: String,
}

/// Dispatch /prediction/* requests
pub async fn handle_prediction_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/prediction").unwrap_or("");

    match (method, subpath) {
        (Method::POST, "/add") => handle_add_prediction(req, state).await,
        (Method::GET, "/all") => handle_list_predictions(req, state).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// POST /prediction/add
async fn handle_add_prediction(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        return resp;
    }

    let body: AddPredictionRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let allocated = match state.allocator.allocate(&PREDICTIONS).await {
        Ok(a) => a,
        Err(e) => return alloc_error_response(e),
    };

    let prediction = PredictionDoc {
        _id: None,
        metadata: crate::db::schemas::Metadata::new(),
        pred_id: allocated.id.clone(),
        pred_score: body.pred_score,
        pred_date: body.pred_date,
        pred_disease: body.pred_disease,
    };

    let collection = match state
        .mongo
        .collection::<PredictionDoc>(PREDICTION_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.insert_one(prediction).await {
        Ok(_) => {
            info!(pred_id = %allocated.id, "prediction saved");
            message_response(format!("Prediction saved with ID: {}", allocated.id))
        }
        Err(e) => db_error_response(e),
    }
}

/// GET /prediction/all
async fn handle_list_predictions(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        return resp;
    }

    let collection = match state
        .mongo
        .collection::<PredictionDoc>(PREDICTION_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_many(doc! {}).await {
        Ok(predictions) => {
            let views: Vec<PredictionView> = predictions.iter().map(PredictionView::from).collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => db_error_response(e),
    }
}

/// POST /predict/{dengue,chikun} - forward the JSON body to the model service
/// and relay the upstream status and body unchanged.
pub async fn handle_predict_proxy(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    if req.method() != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None);
    }

    let upstream_path = match path {
        "/predict/dengue" => "predict_dengue",
        "/predict/chikun" => "predict_chikun",
        _ => return error_response(StatusCode::NOT_FOUND, "Not found", None),
    };

    let body = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read request body", Some("BAD_BODY"));
        }
    };

    let url = format!("{}/{}", state.args.predictor_url.trim_end_matches('/'), upstream_path);
    let upstream = state
        .http
        .post(&url)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(resp) => {
            let status = StatusCode::from_u16(resp.status().as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            match resp.bytes().await {
                Ok(bytes) => Response::builder()
                    .status(status)
                    .header("Content-Type", "application/json")
                    .body(Full::new(bytes))
                    .unwrap_or_else(|_| {
                        error_response(StatusCode::BAD_GATEWAY, "Upstream response error", None)
                    }),
                Err(e) => {
                    warn!("Failed to read upstream body: {}", e);
                    error_response(
                        StatusCode::BAD_GATEWAY,
                        "Prediction service returned an unreadable response",
                        Some("UPSTREAM_ERROR"),
                    )
                }
            }
        }
        Err(e) => {
            warn!("prediction service unreachable: {}", e);
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Prediction service unavailable",
                Some("UPSTREAM_UNAVAILABLE"),
            )
        }
    }
}

/// Map allocation failures onto HTTP responses.
///
/// Contention and store outages are retryable by the client (503); an
/// exhausted namespace is an operator problem (500).
fn alloc_error_response(err: AllocError) -> Response<FullBody> {
    warn!("id allocation failed: {}", err);
    match err {
        AllocError::StoreUnavailable(_) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "ID store unavailable, please retry",
            Some("STORE_UNAVAILABLE"),
        ),
        AllocError::ConflictExceeded { .. } => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "ID allocation contention, please retry",
            Some("CONFLICT_EXCEEDED"),
        ),
        AllocError::NamespaceExhausted { .. } => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ID namespace exhausted",
            Some("NAMESPACE_EXHAUSTED"),
        ),
        AllocError::EmptyNamespace => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ID namespace misconfigured",
            Some("NAMESPACE_INVALID"),
        ),
    }
}
