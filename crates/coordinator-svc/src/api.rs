//! Synchronous JSON API handlers
//!
//! Every handler returns immediately from locally known state; nothing here
//! waits on the worker fleet.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use coordinator_core::{Error, KeygenSession, ParticipantIndex, User, WorkerEvent};

use crate::{ingest, AppState};

/// API error wrapper mapping domain errors to structured responses
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::UserNotFound(_)
            | Error::KeyNotFound(_)
            | Error::RoomNotFound(_)
            | Error::SigningSessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidConfig(_)
            | Error::InvalidParticipant { .. }
            | Error::UnknownParticipant(_) => StatusCode::BAD_REQUEST,
            Error::MalformedEvent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "coordinator-svc",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    #[serde(default)]
    pub telegram_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Register a user
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Json<User> {
    Json(
        state
            .coordinator
            .create_user(req.email, req.telegram_id, req.user_id),
    )
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

/// Look up a user
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.coordinator.get_user(&query.id)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub id: String,
    pub email: String,
}

/// Update a user's email
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.coordinator.update_user(&req.id, req.email)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub user_id: String,
    #[serde(default)]
    pub participants_count: Option<u16>,
    #[serde(default)]
    pub participant_index: Option<ParticipantIndex>,
    #[serde(default)]
    pub participants_threshold: Option<u16>,
}

/// Create a key-generation session and dispatch `keygen_join`
pub async fn create_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .coordinator
        .create_key_session(
            &req.user_id,
            req.participants_count,
            req.participant_index,
            req.participants_threshold,
        )
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct DeleteKeyRequest {
    pub user_id: String,
    pub public_key_id: String,
}

/// Remove a key-generation session
pub async fn delete_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteKeyRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(
        state
            .coordinator
            .delete_key_session(&req.user_id, &req.public_key_id)?,
    ))
}

/// Look up a key-generation session
pub async fn get_key(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<KeygenSession>, ApiError> {
    Ok(Json(state.coordinator.get_key_session(&query.id)?))
}

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub public_key_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub participant_indexes: Vec<ParticipantIndex>,
}

/// Create a signing session and dispatch `sign_approve`
pub async fn sign(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignRequest>,
) -> Result<Json<KeygenSession>, ApiError> {
    let key = state
        .coordinator
        .create_signing_session(
            &req.public_key_id,
            req.room_id,
            req.data,
            req.metadata,
            req.participant_indexes,
        )
        .await?;
    Ok(Json(key))
}

/// Accept a worker progress report over plain HTTP
///
/// Always acknowledged: an unresolvable event is logged and discarded, the
/// fleet is not expected to retry.
pub async fn push_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<WorkerEvent>,
) -> StatusCode {
    ingest(&state.coordinator, event);
    StatusCode::ACCEPTED
}
