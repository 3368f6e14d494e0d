// src/models/assessment_type.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Route slugs accepted as assessment type ids.
static TYPE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_-]{0,49}$").expect("valid slug regex"));

/// Represents the 'assessment_types' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AssessmentType {
    /// Slug used in routes, e.g. "quiz" or "code-snippet".
    pub id: String,
    pub name: String,
}

impl AssessmentType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Types shipped with a fresh database.
    pub fn defaults() -> Vec<AssessmentType> {
        vec![
            AssessmentType::new("quiz", "quiz"),
            AssessmentType::new("multiple_choice", "multiple_choice"),
            AssessmentType::new("code-snippet", "code-snippet"),
            AssessmentType::new("open_question", "open_question"),
        ]
    }
}

pub fn is_valid_type_slug(slug: &str) -> bool {
    TYPE_SLUG.is_match(slug)
}
