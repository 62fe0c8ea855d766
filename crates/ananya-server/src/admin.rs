//! Admin API handlers.
//!
//! Every route here sits behind the bearer-token layer installed by
//! [`AdminServer::router`](crate::AdminServer::router). Errors render as
//! `{"error": {"code", "message"}}`.

use std::sync::Arc;

use ananya_core::errors::AnanyaError;
use ananya_core::ids::{BroadcastId, PersonalityId, UserId};
use ananya_core::personality::PersonalityProfile;
use ananya_runtime::{AdminStats, BroadcastView, NewPersonality, PersonalityUpdate, UserDetails};
use ananya_store::UserRecord;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::AppState;

/// Default page size for `GET /admin/broadcasts`.
const DEFAULT_LIST_LIMIT: usize = 20;
/// Largest page size for `GET /admin/broadcasts`.
const MAX_LIST_LIMIT: usize = 100;

/// Routes mounted under `/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/broadcasts", post(start_broadcast).get(list_broadcasts))
        .route("/broadcasts/{id}", get(broadcast_status))
        .route("/broadcasts/{id}/cancel", post(cancel_broadcast))
        .route("/stats", get(stats))
        .route("/users/lookup", get(lookup_user))
        .route("/users/{id}", get(user_details))
        .route("/users/{id}/block", post(block_user))
        .route("/users/{id}/unblock", post(unblock_user))
        .route("/users/{id}/reset-stats", post(reset_user_stats))
        .route("/users/{id}/message", post(send_message))
        .route("/personalities", get(list_personalities).post(add_personality))
        .route("/personalities/{id}", put(update_personality).delete(remove_personality))
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP-facing error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Error with an explicit status.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 404 for a missing resource.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AnanyaError> for ApiError {
    fn from(err: AnanyaError) -> Self {
        let status = match &err {
            AnanyaError::Validation { .. } => StatusCode::BAD_REQUEST,
            AnanyaError::Capacity { .. } => StatusCode::TOO_MANY_REQUESTS,
            AnanyaError::PermanentRecipient { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AnanyaError::TransientBackend { .. }
            | AnanyaError::CatalogUnavailable { .. }
            | AnanyaError::Store { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AnanyaError::Misconfiguration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Store and configuration details stay in the logs.
        let message = match &err {
            AnanyaError::Store { .. } | AnanyaError::Misconfiguration { .. } => {
                tracing::error!(error = %err, "admin request failed");
                "internal error".to_owned()
            }
            _ => err.to_string(),
        };
        Self::new(status, err.code(), message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": { "code": self.code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ─────────────────────────────────────────────────────────────────────────────
// Broadcasts
// ─────────────────────────────────────────────────────────────────────────────

/// `POST /admin/broadcasts` body.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Message text.
    pub message: String,
}

/// `POST /admin/broadcasts` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastAccepted {
    /// New job identifier.
    pub id: BroadcastId,
    /// Recipients snapshotted at admission.
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn start_broadcast(
    State(state): State<AppState>,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BroadcastAccepted>)> {
    let Json(req) = payload?;
    let job = state.admin.start_broadcast(&req.message).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastAccepted {
            id: job.id().clone(),
            total: job.total(),
        }),
    ))
}

async fn list_broadcasts(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Json<Vec<BroadcastView>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Json(state.admin.recent_broadcasts(limit))
}

async fn broadcast_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<BroadcastView>> {
    let id = BroadcastId::from(id);
    state
        .admin
        .broadcast_status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("broadcast {id}")))
}

async fn cancel_broadcast(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<BroadcastView>> {
    let id = BroadcastId::from(id);
    if !state.admin.cancel_broadcast(&id) {
        return Err(match state.admin.broadcast_status(&id) {
            Some(_) => ApiError::new(StatusCode::CONFLICT, "CONFLICT", format!("broadcast {id} already finished")),
            None => ApiError::not_found(format!("broadcast {id}")),
        });
    }
    state
        .admin
        .broadcast_status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("broadcast {id}")))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<AdminStats>> {
    Ok(Json(state.admin.stats().await?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// Block/unblock response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResponse {
    /// Affected user.
    pub user_id: UserId,
    /// Flag after the call.
    pub blocked: bool,
    /// Whether the flag changed.
    pub changed: bool,
}

async fn block_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<BlockResponse>> {
    let user_id = UserId::new(id);
    let changed = state.admin.block_user(user_id).await?;
    Ok(Json(BlockResponse {
        user_id,
        blocked: true,
        changed,
    }))
}

async fn unblock_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<BlockResponse>> {
    let user_id = UserId::new(id);
    let changed = state.admin.unblock_user(user_id).await?;
    Ok(Json(BlockResponse {
        user_id,
        blocked: false,
        changed,
    }))
}

#[derive(Debug, Deserialize)]
struct LookupQuery {
    q: String,
}

/// `POST /admin/users/{id}/message` body.
#[derive(Debug, Deserialize)]
pub struct DirectMessageRequest {
    /// Message text.
    pub message: String,
}

/// `POST /admin/users/{id}/message` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageSent {
    /// Recipient.
    pub user_id: UserId,
    /// Platform messages used after chunking.
    pub messages: usize,
}

/// `POST /admin/users/{id}/reset-stats` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReset {
    /// Affected user.
    pub user_id: UserId,
}

async fn lookup_user(State(state): State<AppState>, Query(query): Query<LookupQuery>) -> ApiResult<Json<UserRecord>> {
    state
        .admin
        .lookup_user(&query.q)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("user {}", query.q.trim())))
}

async fn user_details(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<UserDetails>> {
    let user_id = UserId::new(id);
    state
        .admin
        .user_details(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("user {user_id}")))
}

async fn reset_user_stats(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<StatsReset>> {
    let user_id = UserId::new(id);
    if state.admin.reset_user_stats(user_id).await? {
        Ok(Json(StatsReset { user_id }))
    } else {
        Err(ApiError::not_found(format!("user {user_id}")))
    }
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<DirectMessageRequest>, JsonRejection>,
) -> ApiResult<Json<DirectMessageSent>> {
    let Json(req) = payload?;
    let user_id = UserId::new(id);
    let messages = state
        .admin
        .send_message(user_id, &req.message)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id}")))?;
    Ok(Json(DirectMessageSent { user_id, messages }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Personalities
// ─────────────────────────────────────────────────────────────────────────────

async fn list_personalities(State(state): State<AppState>) -> ApiResult<Json<Vec<PersonalityProfile>>> {
    Ok(Json(state.admin.personalities().await?))
}

async fn add_personality(
    State(state): State<AppState>,
    payload: Result<Json<NewPersonality>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PersonalityProfile>)> {
    let Json(new) = payload?;
    let profile = state.admin.add_personality(new).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn update_personality(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PersonalityUpdate>, JsonRejection>,
) -> ApiResult<Json<PersonalityProfile>> {
    let Json(update) = payload?;
    state
        .admin
        .update_personality(&id, update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("personality {}", PersonalityId::normalized(&id))))
}

async fn remove_personality(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = PersonalityId::normalized(&id);
    if state.admin.remove_personality(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("personality {id}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ananya_core::errors::Backend;

    fn status_of(err: AnanyaError) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn error_statuses() {
        assert_eq!(status_of(AnanyaError::validation("empty")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AnanyaError::Capacity {
                resource: "broadcast_jobs".into(),
                limit: 2
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(AnanyaError::transient(Backend::Store, "locked")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AnanyaError::catalog_unavailable("down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AnanyaError::misconfiguration("no default")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_details_are_hidden() {
        let err = ApiError::from(AnanyaError::store("disk I/O error at /var/lib/ananya.db"));
        assert_eq!(err.message, "internal error");
        assert_eq!(err.code, "STORE");
    }

    #[test]
    fn validation_message_is_kept() {
        let err = ApiError::from(AnanyaError::validation("message is empty"));
        assert!(err.message.contains("message is empty"));
        assert_eq!(err.code, "VALIDATION");
    }
}
