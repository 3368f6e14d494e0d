// src/handlers/assessment_type.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::AppError, orchestrator::AssessmentOrchestrator};

/// Lists the assessment types a quiz can be started with.
pub async fn list_assessment_types(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
) -> Result<impl IntoResponse, AppError> {
    let types = orchestrator.stores().types.find_all().await?;
    Ok(Json(types))
}
