// src/store/mapper.rs

//! Row types for the relational schema and their translation to domain structs.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, types::Json};

use super::StoreError;
use crate::models::{assessment::Assessment, question::Question};

/// Represents the 'assessments' table.
#[derive(Debug, Clone, FromRow)]
pub struct AssessmentRow {
    pub id: String,
    pub assessment_type_id: String,
    pub assessment_type_name: String,
    pub user_device_id: String,
    pub category_id: Option<String>,
    pub language_id: Option<String>,
    pub difficulty_at_start: String,
    pub difficulty_at_end: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub state: String,
    pub thread_id: Option<String>,
}

/// Represents the 'questions' table. `position` orders questions within an assessment.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub assessment_id: String,
    pub position: i32,
    pub content: String,
    pub options: Json<Vec<String>>,
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub explanation: Option<String>,
    pub taken_time_ms: Option<i64>,
    pub asked_at: DateTime<Utc>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            content: row.content,
            options: row.options.0,
            correct_answer: row.correct_answer,
            user_answer: row.user_answer,
            is_correct: row.is_correct,
            explanation: row.explanation,
            taken_time: row.taken_time_ms.map(|ms| ms.max(0) as u64),
            asked_at: row.asked_at,
        }
    }
}

pub fn question_row(assessment_id: &str, position: i32, q: &Question) -> QuestionRow {
    QuestionRow {
        assessment_id: assessment_id.to_string(),
        position,
        content: q.content.clone(),
        options: Json(q.options.clone()),
        correct_answer: q.correct_answer.clone(),
        user_answer: q.user_answer.clone(),
        is_correct: q.is_correct,
        explanation: q.explanation.clone(),
        taken_time_ms: q.taken_time.map(|ms| ms.min(i64::MAX as u64) as i64),
        asked_at: q.asked_at,
    }
}

pub fn assessment_row(a: &Assessment) -> AssessmentRow {
    AssessmentRow {
        id: a.assessment_id.clone(),
        assessment_type_id: a.assessment_type_id.clone(),
        assessment_type_name: a.assessment_type_name.clone(),
        user_device_id: a.user_device_id.clone(),
        category_id: a.category_id.clone(),
        language_id: a.language_id.clone(),
        difficulty_at_start: a.difficulty_at_start.as_str().to_string(),
        difficulty_at_end: a.difficulty_at_end.as_str().to_string(),
        start_time: a.start_time,
        end_time: a.end_time,
        feedback: a.feedback.clone(),
        state: a.state.as_str().to_string(),
        thread_id: a.thread_id.clone(),
    }
}

/// Builds the domain struct from its row and its question rows (already ordered).
pub fn to_domain(row: AssessmentRow, questions: Vec<QuestionRow>) -> Result<Assessment, StoreError> {
    let corrupt = |e: String| StoreError::Corrupt(format!("assessment {}: {}", row.id, e));

    Ok(Assessment {
        difficulty_at_start: row.difficulty_at_start.parse().map_err(corrupt)?,
        difficulty_at_end: row.difficulty_at_end.parse().map_err(corrupt)?,
        state: row.state.parse().map_err(corrupt)?,
        assessment_id: row.id,
        assessment_type_id: row.assessment_type_id,
        assessment_type_name: row.assessment_type_name,
        user_device_id: row.user_device_id,
        category_id: row.category_id,
        language_id: row.language_id,
        start_time: row.start_time,
        end_time: row.end_time,
        feedback: row.feedback,
        thread_id: row.thread_id,
        questions: questions.into_iter().map(Question::from).collect(),
    })
}
