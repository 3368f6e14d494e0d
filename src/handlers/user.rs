// src/handlers/user.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{CreateUserRequest, NewUser},
    orchestrator::AssessmentOrchestrator,
    store::StoreError,
};

/// Registers a device.
/// Returns 201 Created, or 409 if the device is already known.
pub async fn register_user(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = orchestrator
        .stores()
        .users
        .save(NewUser::active(payload.device_id.clone(), payload.name))
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => {
                AppError::Conflict(format!("Device '{}' already exists", payload.device_id))
            }
            other => {
                tracing::error!("Failed to register user: {:?}", other);
                AppError::from(other)
            }
        })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Lists all users, newest first.
pub async fn list_users(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
) -> Result<impl IntoResponse, AppError> {
    let users = orchestrator.stores().users.find_all().await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = orchestrator
        .stores()
        .users
        .find(id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Deletes a user by ID. Their assessments are kept.
pub async fn delete_user(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !orchestrator.stores().users.delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
