//! Notification endpoints
//!
//! - `POST /notification/add` - create a notification for the caller
//! - `GET /notification/all` - list every notification (admin only)
//! - `GET /notification/my` - list the caller's notifications
//! - `DELETE /notification/delete/{id}` - delete by document id (owner or admin)

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::PolicyAction;
use crate::db::schemas::{Metadata, NotificationDoc, NOTIFICATION_COLLECTION};
use crate::routes::{
    db_error_response, error_response, json_response, message_response, read_json_body, require,
    FullBody,
};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
}

impl From<&NotificationDoc> for NotificationView {
    fn from(n: &NotificationDoc) -> Self {
        Self {
            id: n._id.map(|oid| oid.to_hex()).unwrap_or_default(),
            user_id: n.user_id.clone(),
            title: n.title.clone(),
            description: n.description.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddNotificationRequest {
    title: String,
    description: String,
}

/// Dispatch /notification/* requests
pub async fn handle_notification_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/notification").unwrap_or("");

    match (method, subpath) {
        (Method::POST, "/add") => handle_add_notification(req, state).await,
        (Method::GET, "/all") => handle_list_all(req, state).await,
        (Method::GET, "/my") => handle_list_own(req, state).await,
        (Method::DELETE, p) if p.starts_with("/delete/") => {
            let id = p.strip_prefix("/delete/").unwrap_or("").to_string();
            handle_delete_notification(req, state, &id).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// POST /notification/add - addressed to the verified caller
async fn handle_add_notification(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<FullBody> {
    let decision = match require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let body: AddNotificationRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let notification = NotificationDoc {
        _id: None,
        metadata: Metadata::new(),
        user_id: decision.identity.subject_id.clone(),
        title: body.title,
        description: body.description,
    };

    let collection = match state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.insert_one(notification).await {
        Ok(_) => {
            info!(user_id = %decision.identity.subject_id, "notification created");
            message_response("Notification saved".to_string())
        }
        Err(e) => db_error_response(e),
    }
}

/// GET /notification/all - admin only
async fn handle_list_all(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AdminOnly, None).await {
        return resp;
    }

    let collection = match state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_many(doc! {}).await {
        Ok(notifications) => {
            let views: Vec<NotificationView> =
                notifications.iter().map(NotificationView::from).collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => db_error_response(e),
    }
}

/// GET /notification/my - notifications addressed to the caller
async fn handle_list_own(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let decision = match require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let collection = match state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection
        .find_many(doc! { "user_id": &decision.identity.subject_id })
        .await
    {
        Ok(notifications) => {
            let views: Vec<NotificationView> =
                notifications.iter().map(NotificationView::from).collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => db_error_response(e),
    }
}

/// DELETE /notification/delete/{id} - gated against the stored addressee
async fn handle_delete_notification(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<FullBody> {
    let oid = match ObjectId::parse_str(id) {
        Ok(oid) => oid,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid notification ID: {id}"),
                Some("BAD_ID"),
            )
        }
    };

    let collection = match state
        .mongo
        .collection::<NotificationDoc>(NOTIFICATION_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let stored = match collection.find_one(doc! { "_id": oid }).await {
        Ok(Some(n)) => n,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &format!("Notification with ID {id} does not exist."),
                Some("NOT_FOUND"),
            )
        }
        Err(e) => return db_error_response(e),
    };

    if let Err(resp) = require(&req, &state, PolicyAction::SelfOrAdmin, Some(&stored.user_id)).await
    {
        return resp;
    }

    match collection.soft_delete(doc! { "_id": oid }).await {
        Ok(_) => {
            info!(notification_id = %id, "notification deleted");
            message_response(format!("Notification {id} deleted"))
        }
        Err(e) => db_error_response(e),
    }
}
