// src/handlers/assessment.rs

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
    models::{
        assessment::{StartAssessmentRequest, StartAssessmentResponse, SubmitAnswerRequest},
        assessment_type::is_valid_type_slug,
        quiz::CompleteResponse,
    },
    orchestrator::AssessmentOrchestrator,
};

fn check_slug(assessment_type: &str) -> Result<(), AppError> {
    if !is_valid_type_slug(assessment_type) {
        return Err(AppError::BadRequest(format!(
            "Invalid assessment type '{}'",
            assessment_type
        )));
    }
    Ok(())
}

/// Starts a new assessment of the given type.
///
/// Registers the device on first use and opens an assistant thread.
/// Returns 201 Created with the assessment id.
pub async fn start_assessment(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path(assessment_type): Path<String>,
    Json(payload): Json<StartAssessmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_slug(&assessment_type)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let assessment_id = orchestrator
        .start_assessment(&assessment_type, payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartAssessmentResponse { assessment_id }),
    ))
}

/// Has the assistant generate the next question (correct answer hidden).
pub async fn next_question(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path((assessment_type, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    check_slug(&assessment_type)?;
    orchestrator.load_of_type(&assessment_type, &id).await?;

    let question = orchestrator.request_question(&id).await?;
    Ok(Json(question))
}

/// Submits the user's answer to the pending question.
/// Blocks until the assistant has evaluated it.
pub async fn submit_answer(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path((assessment_type, id)): Path<(String, String)>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_slug(&assessment_type)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    orchestrator.load_of_type(&assessment_type, &id).await?;

    let outcome = orchestrator
        .submit_answer(&id, payload.answer, payload.taken_time)
        .await?;
    Ok(Json(outcome))
}

/// Finalizes the assessment with assistant feedback and returns the summary.
pub async fn complete_assessment(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path((assessment_type, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    check_slug(&assessment_type)?;
    orchestrator.load_of_type(&assessment_type, &id).await?;

    let quiz = orchestrator.complete_assessment(&id).await?;
    Ok(Json(CompleteResponse { quiz }))
}

/// Completion flag polled by clients.
pub async fn get_status(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path((assessment_type, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    check_slug(&assessment_type)?;
    orchestrator.load_of_type(&assessment_type, &id).await?;

    Ok(Json(orchestrator.get_status(&id).await?))
}

/// Retrieves the assessment summary.
pub async fn get_assessment(
    State(orchestrator): State<Arc<AssessmentOrchestrator>>,
    Path((assessment_type, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    check_slug(&assessment_type)?;
    orchestrator.load_of_type(&assessment_type, &id).await?;

    Ok(Json(orchestrator.get_summary(&id).await?))
}
