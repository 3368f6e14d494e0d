// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{assessment, assessment_type, user},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (users, assessment types, assessments).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (orchestrator and config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let user_routes = Router::new()
        .route("/", get(user::list_users).post(user::register_user))
        .route("/{id}", get(user::get_user).delete(user::delete_user));

    let type_routes = Router::new().route("/", get(assessment_type::list_assessment_types));

    let assessment_routes = Router::new()
        .route("/{type}", post(assessment::start_assessment))
        .route("/{type}/{id}", get(assessment::get_assessment))
        .route("/{type}/{id}/questions", post(assessment::next_question))
        .route("/{type}/{id}/answers", post(assessment::submit_answer))
        .route("/{type}/{id}/complete", post(assessment::complete_assessment))
        .route("/{type}/{id}/status", get(assessment::get_status));

    Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/assessment-types", type_routes)
        .nest("/api/assessments", assessment_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
