use crate::db::models::{NewUser, Vote};
use crate::error::ApiError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

// Request DTOs
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub email: String,
    pub event_id: String,
    pub vote: String,
}

/// Register a participant. The password is stored as a bcrypt hash.
pub async fn register(
    Extension(app_state): Extension<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidRequest);
    }

    if app_state.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "Registration attempt with existing email");
        return Err(ApiError::UserAlreadyExists);
    }

    let cost = app_state.bcrypt_cost;
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| {
            error!("password hashing task failed: {}", e);
            ApiError::Hashing
        })?
        .map_err(|e| {
            error!("bcrypt error: {}", e);
            ApiError::Hashing
        })?;

    let created = app_state
        .users
        .create(NewUser {
            username: payload.username,
            email: payload.email.clone(),
            password_hash,
        })
        .await?;

    // Lost a race with a concurrent registration for the same email.
    if created.is_none() {
        warn!(email = %payload.email, "Registration attempt with existing email");
        return Err(ApiError::UserAlreadyExists);
    }

    info!(email = %payload.email, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    ))
}

/// Record a vote. Options are not validated and repeat votes are accepted.
pub async fn cast_vote(
    Extension(app_state): Extension<AppState>,
    Json(payload): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = match app_state.users.find_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            error!(email = %payload.email, "Vote attempt by non-existent user");
            return Err(ApiError::UserNotFound);
        }
    };

    let vote = Vote::new(user.id, payload.event_id.clone(), payload.vote);
    app_state.votes.insert(vote).await?;
    info!(
        email = %payload.email,
        event_id = %payload.event_id,
        "Vote recorded"
    );

    app_state.calculator.vote_recorded(&payload.event_id);

    Ok((StatusCode::OK, Json(json!({"message": "Vote recorded"}))))
}

/// Start a result calculation in the background and answer straight away.
pub async fn trigger_calculation(
    Extension(app_state): Extension<AppState>,
    Path(event_id): Path<String>,
) -> impl IntoResponse {
    app_state.calculator.schedule(event_id.clone());
    info!(event_id = %event_id, "Result calculation started");

    (
        StatusCode::ACCEPTED,
        Json(json!({"message": "Result calculation started"})),
    )
}

/// Latest stored tally for an event.
pub async fn get_results(
    Extension(app_state): Extension<AppState>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match app_state.results.find(&event_id).await? {
        Some(tally) => Ok((StatusCode::OK, Json(json!({"results": tally.counts})))),
        None => {
            error!(event_id = %event_id, "Results not found");
            Err(ApiError::ResultsNotFound)
        }
    }
}
