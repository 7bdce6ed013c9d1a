//! Medical record endpoints
//!
//! - `POST /medrec/add` - create a record owned by the caller
//! - `GET /medrec/all` - list every record (admin only)
//! - `GET /medrec/user` - list the caller's own records
//! - `GET /medrec/{id}` - fetch one record (owner or admin)
//! - `PUT /medrec/update/{id}` - update clinical fields (owner or admin)
//! - `DELETE /medrec/delete/{id}` - soft delete (owner or admin)
//!
//! Ownership checks compare against the `user_id` stored on the record,
//! never against anything supplied in the request, so a forged payload
//! cannot widen access.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::PolicyAction;
use crate::db::schemas::{MedicalRecordDoc, RECORD_COLLECTION};
use crate::routes::{
    db_error_response, error_response, json_response, message_response, read_json_body, require,
    FullBody,
};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub med_id: String,
    pub user_id: String,
    pub diagnosis: String,
    pub risk_status: String,
    pub date: String,
    pub symptoms: String,
    pub pred_score: f64,
}

impl From<&MedicalRecordDoc> for RecordView {
    fn from(r: &MedicalRecordDoc) -> Self {
        Self {
            med_id: r.med_id.clone(),
            user_id: r.user_id.clone(),
            diagnosis: r.diagnosis.clone(),
            risk_status: r.risk_status.clone(),
            date: r.date.clone(),
            symptoms: r.symptoms.clone(),
            pred_score: r.pred_score,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddRecordRequest {
    diagnosis: String,
    risk_status: String,
    date: String,
    #[serde(default)]
    symptoms: String,
    #[serde(default)]
    pred_score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRecordRequest {
    diagnosis: Option<String>,
    risk_status: Option<String>,
    date: Option<String>,
    symptoms: Option<String>,
    pred_score: Option<f64>,
}

/// Dispatch /medrec/* requests
pub async fn handle_record_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/medrec").unwrap_or("");

    match (method, subpath) {
        (Method::POST, "/add") => handle_add_record(req, state).await,
        (Method::GET, "/all") => handle_list_all(req, state).await,
        (Method::GET, "/user") => handle_list_own(req, state).await,
        (Method::PUT, p) if p.starts_with("/update/") => {
            let id = p.strip_prefix("/update/").unwrap_or("").to_string();
            handle_update_record(req, state, &id).await
        }
        (Method::DELETE, p) if p.starts_with("/delete/") => {
            let id = p.strip_prefix("/delete/").unwrap_or("").to_string();
            handle_delete_record(req, state, &id).await
        }
        (Method::GET, p) if p.len() > 1 && !p[1..].contains('/') => {
            let id = p[1..].to_string();
            handle_get_record(req, state, &id).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// POST /medrec/add
///
/// The record is stamped with the caller's verified subject identity, not
/// a user id from the payload.
async fn handle_add_record(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let decision = match require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let body: AddRecordRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let med_id = Uuid::new_v4().to_string();
    let record = MedicalRecordDoc::new(
        med_id.clone(),
        decision.identity.subject_id.clone(),
        body.diagnosis,
        body.risk_status,
        body.date,
        body.symptoms,
        body.pred_score,
    );

    let collection = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.insert_one(record).await {
        Ok(_) => {
            info!(med_id = %med_id, user_id = %decision.identity.subject_id, "medical record created");
            message_response(format!("Medical record saved with ID: {med_id}"))
        }
        Err(e) => db_error_response(e),
    }
}

/// GET /medrec/all - admin only
async fn handle_list_all(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AdminOnly, None).await {
        return resp;
    }

    let collection = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_many(doc! {}).await {
        Ok(records) => {
            let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => db_error_response(e),
    }
}

/// GET /medrec/user - records owned by the caller
async fn handle_list_own(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let decision = match require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let collection = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection
        .find_many(doc! { "user_id": &decision.identity.subject_id })
        .await
    {
        Ok(records) => {
            let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => db_error_response(e),
    }
}

/// GET /medrec/{id} - gated against the stored owner
async fn handle_get_record(
    req: Request<Incoming>,
    state: Arc<AppState>,
    med_id: &str,
) -> Response<FullBody> {
    let collection = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let record = match fetch_record(&collection, med_id).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if let Err(resp) = require(&req, &state, PolicyAction::SelfOrAdmin, Some(&record.user_id)).await
    {
        return resp;
    }

    json_response(StatusCode::OK, &RecordView::from(&record))
}

/// PUT /medrec/update/{id} - owner or admin; only clinical fields change
async fn handle_update_record(
    req: Request<Incoming>,
    state: Arc<AppState>,
    med_id: &str,
) -> Response<FullBody> {
    let collection = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let record = match fetch_record(&collection, med_id).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if let Err(resp) = require(&req, &state, PolicyAction::SelfOrAdmin, Some(&record.user_id)).await
    {
        return resp;
    }

    let body: UpdateRecordRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let mut set = bson::Document::new();
    if let Some(diagnosis) = body.diagnosis {
        set.insert("diagnosis", diagnosis);
    }
    if let Some(risk_status) = body.risk_status {
        set.insert("risk_status", risk_status);
    }
    if let Some(date) = body.date {
        set.insert("date", date);
    }
    if let Some(symptoms) = body.symptoms {
        set.insert("symptoms", symptoms);
    }
    if let Some(pred_score) = body.pred_score {
        set.insert("pred_score", pred_score);
    }

    if set.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No fields to update.", Some("EMPTY_UPDATE"));
    }

    match collection
        .update_one(doc! { "med_id": med_id }, doc! { "$set": set })
        .await
    {
        Ok(_) => message_response(format!("Medical record {med_id} updated")),
        Err(e) => db_error_response(e),
    }
}

/// DELETE /medrec/delete/{id} - owner or admin, soft delete
async fn handle_delete_record(
    req: Request<Incoming>,
    state: Arc<AppState>,
    med_id: &str,
) -> Response<FullBody> {
    let collection = match state
        .mongo
        .collection::<MedicalRecordDoc>(RECORD_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let record = match fetch_record(&collection, med_id).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if let Err(resp) = require(&req, &state, PolicyAction::SelfOrAdmin, Some(&record.user_id)).await
    {
        return resp;
    }

    match collection.soft_delete(doc! { "med_id": med_id }).await {
        Ok(_) => {
            info!(med_id = %med_id, "medical record deleted");
            message_response(format!("Medical record {med_id} deleted"))
        }
        Err(e) => db_error_response(e),
    }
}

async fn fetch_record(
    collection: &crate::db::MongoCollection<MedicalRecordDoc>,
    med_id: &str,
) -> Result<MedicalRecordDoc, Response<FullBody>> {
    match collection.find_one(doc! { "med_id": med_id }).await {
        Ok(Some(r)) => Ok(r),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            &format!("Medical record with ID {med_id} does not exist."),
            Some("NOT_FOUND"),
        )),
        Err(e) => Err(db_error_response(e)),
    }
}
