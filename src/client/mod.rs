// src/client/mod.rs

//! Client side of the quiz flow: an HTTP client for the assessment API and
//! the controller that walks a user from question to summary.

pub mod api;
pub mod controller;
pub mod route_params;

pub use api::QuizApiClient;
pub use controller::{Navigation, QuizController, QuizState};
pub use route_params::{RouteParams, SeededQuestion};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("assessment did not complete after {polls} polls")]
    Timeout { polls: u32 },

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("action not available while {0:?}")]
    InvalidState(QuizState),
}
