//! Dashboard endpoints
//!
//! - `GET /dashboard/stats` - aggregate counts for the admin dashboard

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::PolicyAction;
use crate::db::schemas::{MedicalRecordDoc, UserDoc, RECORD_COLLECTION, USER_COLLECTION};
use crate::routes::{db_error_response, error_response, json_response, require, FullBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_cases: u64,
    pub dengue_cases: u64,
    pub chikungunya_cases: u64,
}

/// Dispatch /dashboard/* requests
pub async fn handle_dashboard_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    match (req.method(), path) {
        (&Method::GET, "/dashboard/stats") => handle_stats(req, state).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// GET /dashboard/stats - admin only
async fn handle_stats(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AdminOnly, None).await {
        return resp;
    }

    let users = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };
    let records = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let total_users = match users.count(doc! {}).await {
        Ok(n) => n,
        Err(e) => return db_error_response(e),
    };
    let total_cases = match records.count(doc! {}).await {
        Ok(n) => n,
        Err(e) => return db_error_response(e),
    };
    let dengue_cases = match records.count(doc! { "diagnosis": "Dengue" }).await {
        Ok(n) => n,
        Err(e) => return db_error_response(e),
    };
    let chikungunya_cases = match records.count(doc! { "diagnosis": "Chikungunya" }).await {
        Ok(n) => n,
        Err(e) => return db_error_response(e),
    };

    json_response(
        StatusCode::OK,
        &DashboardStats {
            total_users,
            total_cases,
            dengue_cases,
            chikungunya_cases,
        },
    )
}
