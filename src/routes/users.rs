//! User endpoints
//!
//! - `POST /user/signup` - create the profile for a verified credential
//! - `POST /user/verify` - verify a token and return the caller's profile
//! - `POST /user/login` - admin login check
//! - `GET /user/all` - list users (admin only)
//! - `PUT /user/update/{uid}` - update profile fields (self or admin)
//! - `DELETE /user/delete/{uid}` - soft delete (admin only)
//!
//! `user_id` is the verified subject identity and never changes after
//! signup; `role` is validated against the closed enum at signup and is
//! not updatable through `/user/update`.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::PolicyAction;
use crate::db::schemas::{Role, UserDoc, USER_COLLECTION};
use crate::routes::{
    bearer_token, db_error_response, error_response, gate_error_response, json_response,
    message_response, read_json_body, require, FullBody,
};
use crate::server::AppState;

/// User profile as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id: String,
    pub name: String,
    pub nic: String,
    pub email: String,
    pub city: String,
    pub contact: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&UserDoc> for UserView {
    fn from(u: &UserDoc) -> Self {
        Self {
            user_id: u.user_id.clone(),
            name: u.name.clone(),
            nic: u.nic.clone(),
            email: u.email.clone(),
            city: u.city.clone(),
            contact: u.contact.clone(),
            role: u.role,
            created_at: u
                .metadata
                .created_at
                .map(|t| t.try_to_rfc3339_string().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    name: String,
    nic: String,
    #[serde(default)]
    email: Option<String>,
    city: String,
    contact: String,
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    name: Option<String>,
    nic: Option<String>,
    email: Option<String>,
    city: Option<String>,
    contact: Option<String>,
}

/// Dispatch /user/* requests
pub async fn handle_user_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/user").unwrap_or("");

    match (method, subpath) {
        (Method::POST, "/signup") => handle_signup(req, state).await,
        (Method::POST, "/verify") => handle_verify(req, state).await,
        (Method::POST, "/login") => handle_login(req, state).await,
        (Method::GET, "/all") => handle_list_users(req, state).await,
        (Method::PUT, p) if p.starts_with("/update/") => {
            let uid = p.strip_prefix("/update/").unwrap_or("").to_string();
            handle_update_user(req, state, &uid).await
        }
        (Method::DELETE, p) if p.starts_with("/delete/") => {
            let uid = p.strip_prefix("/delete/").unwrap_or("").to_string();
            handle_delete_user(req, state, &uid).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

/// POST /user/signup
///
/// Requires a verified bearer credential; the new record's `user_id` is
/// the credential's subject, so the profile can only be created by the
/// account it belongs to.
async fn handle_signup(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let token = match bearer_token(&req) {
        Some(t) => t.to_string(),
        None => {
            return error_response(StatusCode::UNAUTHORIZED, "No token provided", Some("NO_TOKEN"))
        }
    };

    let identity = match state.gate.verify_credential(&token).await {
        Ok(claim) => claim,
        Err(e) => return gate_error_response(e),
    };

    let body: SignupRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    // Reject unknown roles at the write boundary
    let role: Role = match body.role.parse() {
        Ok(r) => r,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg, Some("INVALID_ROLE")),
    };

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_one(doc! { "user_id": &identity.subject_id }).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                "A profile already exists for this account",
                Some("ALREADY_EXISTS"),
            )
        }
        Ok(None) => {}
        Err(e) => return db_error_response(e),
    }

    // The provider-asserted email wins over the request body
    let email = if identity.email.is_empty() {
        body.email.unwrap_or_default()
    } else {
        identity.email.clone()
    };

    let user = UserDoc::new(
        identity.subject_id.clone(),
        body.name,
        body.nic,
        email,
        body.city,
        body.contact,
        role,
    );

    if let Err(e) = collection.insert_one(user).await {
        return db_error_response(e);
    }

    info!(user_id = %identity.subject_id, %role, "user profile created");
    message_response(format!(
        "User created successfully with UID: {} and role: {}",
        identity.subject_id, role
    ))
}

/// POST /user/verify - return the profile of the authenticated caller
async fn handle_verify(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let decision = match require(&req, &state, PolicyAction::AuthenticatedOnly, None).await {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    fetch_user_view(&state, &decision.identity.subject_id).await
}

/// POST /user/login - admin login via a token in the JSON body
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let body: LoginRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    if body.id_token.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "ID token is required", Some("NO_TOKEN"));
    }

    let decision = match state
        .gate
        .authorize(&body.id_token, PolicyAction::AdminOnly, None)
        .await
    {
        Ok(d) => d,
        Err(e) => return gate_error_response(e),
    };

    if !decision.allowed {
        return error_response(
            StatusCode::FORBIDDEN,
            "Access denied: Admin privileges required",
            Some("FORBIDDEN"),
        );
    }

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    let user = match collection
        .find_one(doc! { "user_id": &decision.identity.subject_id })
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(StatusCode::UNAUTHORIZED, "User not found", Some("UNKNOWN_SUBJECT"))
        }
        Err(e) => return db_error_response(e),
    };

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct LoginResponse {
        message: &'static str,
        user: UserView,
        is_admin: bool,
    }

    json_response(
        StatusCode::OK,
        &LoginResponse {
            message: "Login successful",
            user: UserView::from(&user),
            is_admin: true,
        },
    )
}

/// GET /user/all - admin only
async fn handle_list_users(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AdminOnly, None).await {
        return resp;
    }

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_many(doc! {}).await {
        Ok(users) => {
            let views: Vec<UserView> = users.iter().map(UserView::from).collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => db_error_response(e),
    }
}

/// PUT /user/update/{uid} - self or admin; identity fields stay immutable
async fn handle_update_user(
    req: Request<Incoming>,
    state: Arc<AppState>,
    uid: &str,
) -> Response<FullBody> {
    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    // Resolve the stored record first; its user_id is the owner the gate
    // compares against, not anything in the request payload.
    let stored = match collection.find_one(doc! { "user_id": uid }).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &format!("User with ID {uid} does not exist."),
                Some("NOT_FOUND"),
            )
        }
        Err(e) => return db_error_response(e),
    };

    if let Err(resp) = require(&req, &state, PolicyAction::SelfOrAdmin, Some(&stored.user_id)).await
    {
        return resp;
    }

    let body: UpdateUserRequest = match read_json_body(req).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let mut set = bson::Document::new();
    if let Some(name) = body.name {
        set.insert("name", name);
    }
    if let Some(nic) = body.nic {
        set.insert("nic", nic);
    }
    if let Some(email) = body.email {
        set.insert("email", email);
    }
    if let Some(city) = body.city {
        set.insert("city", city);
    }
    if let Some(contact) = body.contact {
        set.insert("contact", contact);
    }

    if set.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No fields to update.", Some("EMPTY_UPDATE"));
    }

    match collection
        .update_one(doc! { "user_id": uid }, doc! { "$set": set })
        .await
    {
        Ok(_) => message_response(format!("User {uid} updated")),
        Err(e) => db_error_response(e),
    }
}

/// DELETE /user/delete/{uid} - admin only, soft delete
async fn handle_delete_user(
    req: Request<Incoming>,
    state: Arc<AppState>,
    uid: &str,
) -> Response<FullBody> {
    if let Err(resp) = require(&req, &state, PolicyAction::AdminOnly, None).await {
        return resp;
    }

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_one(doc! { "user_id": uid }).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &format!("User with ID {uid} does not exist."),
                Some("NOT_FOUND"),
            )
        }
        Err(e) => return db_error_response(e),
    }

    match collection.soft_delete(doc! { "user_id": uid }).await {
        Ok(_) => {
            info!(user_id = %uid, "user deleted");
            message_response(format!("User {uid} deleted"))
        }
        Err(e) => db_error_response(e),
    }
}

/// Look up a user and render the profile view
async fn fetch_user_view(state: &AppState, subject_id: &str) -> Response<FullBody> {
    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => return db_error_response(e),
    };

    match collection.find_one(doc! { "user_id": subject_id }).await {
        Ok(Some(user)) => json_response(StatusCode::OK, &UserView::from(&user)),
        Ok(None) => error_response(StatusCode::UNAUTHORIZED, "User not found", Some("UNKNOWN_SUBJECT")),
        Err(e) => db_error_response(e),
    }
}
