// src/state.rs

use std::sync::Arc;

use crate::{config::Config, orchestrator::AssessmentOrchestrator};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AssessmentOrchestrator>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<AssessmentOrchestrator> {
    fn from_ref(state: &AppState) -> Self {
        state.orchestrator.clone()
    }
}
