// src/models/assessment.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{MAX_OPTIONS, Question};

/// Ordinal complexity setting of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Persisted lifecycle state of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentState {
    InProgress,
    Completed,
}

impl AssessmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentState::InProgress => "in_progress",
            AssessmentState::Completed => "completed",
        }
    }
}

impl FromStr for AssessmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AssessmentState::InProgress),
            "completed" => Ok(AssessmentState::Completed),
            other => Err(format!("unknown assessment state '{}'", other)),
        }
    }
}

/// Rule violations when mutating an assessment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("assessment is already completed")]
    AlreadyCompleted,
    #[error("no question is awaiting an answer")]
    NoPendingQuestion,
    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

/// One quiz/test attempt by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub assessment_id: String,
    pub assessment_type_id: String,
    pub assessment_type_name: String,
    pub user_device_id: String,
    pub category_id: Option<String>,
    pub language_id: Option<String>,
    pub difficulty_at_start: Difficulty,
    pub difficulty_at_end: Difficulty,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub state: AssessmentState,

    /// Conversation thread on the AI provider backing this assessment.
    pub thread_id: Option<String>,

    pub questions: Vec<Question>,
}

impl Assessment {
    pub fn new(
        assessment_id: String,
        assessment_type_id: String,
        assessment_type_name: String,
        user_device_id: String,
        difficulty: Difficulty,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            assessment_id,
            assessment_type_id,
            assessment_type_name,
            user_device_id,
            category_id: None,
            language_id: None,
            difficulty_at_start: difficulty,
            difficulty_at_end: difficulty,
            start_time,
            end_time: None,
            feedback: None,
            state: AssessmentState::InProgress,
            thread_id: None,
            questions: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == AssessmentState::Completed
    }

    /// Choice-type assessments present answer options with every question.
    pub fn is_choice_type(&self) -> bool {
        is_choice_type(&self.assessment_type_id)
    }

    /// Index of the most recent question still awaiting an evaluated answer.
    pub fn pending_question_index(&self) -> Option<usize> {
        self.questions.iter().rposition(Question::is_pending)
    }

    /// Appends a question, enforcing the option rules of the assessment type.
    pub fn record_question(&mut self, question: Question) -> Result<usize, DomainError> {
        self.ensure_open()?;
        validate_question(&question, self.is_choice_type())?;
        self.questions.push(question);
        Ok(self.questions.len() - 1)
    }

    /// Writes the evaluation onto the pending question and returns its index.
    pub fn answer_pending(
        &mut self,
        user_answer: String,
        is_correct: bool,
        explanation: String,
        taken_time: u64,
    ) -> Result<usize, DomainError> {
        self.ensure_open()?;
        let index = self
            .pending_question_index()
            .ok_or(DomainError::NoPendingQuestion)?;

        let question = &mut self.questions[index];
        question.user_answer = Some(user_answer);
        question.is_correct = Some(is_correct);
        question.explanation = Some(explanation);
        question.taken_time = Some(taken_time);

        Ok(index)
    }

    pub fn adjust_difficulty(&mut self, difficulty: Difficulty) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.difficulty_at_end = difficulty;
        Ok(())
    }

    /// Finalizes the assessment. `feedback` and `end_time` are written together, once.
    pub fn complete(&mut self, feedback: String, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.feedback = Some(feedback);
        self.end_time = Some(at);
        self.state = AssessmentState::Completed;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_completed() {
            return Err(DomainError::AlreadyCompleted);
        }
        Ok(())
    }
}

pub fn is_choice_type(assessment_type_id: &str) -> bool {
    matches!(assessment_type_id, "quiz" | "multiple_choice")
}

fn validate_question(question: &Question, choice_type: bool) -> Result<(), DomainError> {
    if question.content.trim().is_empty() {
        return Err(DomainError::InvalidQuestion("content is empty".to_string()));
    }
    if question.correct_answer.trim().is_empty() {
        return Err(DomainError::InvalidQuestion(
            "correct answer is empty".to_string(),
        ));
    }
    if question.options.len() > MAX_OPTIONS {
        return Err(DomainError::InvalidQuestion(format!(
            "at most {} options allowed",
            MAX_OPTIONS
        )));
    }
    if question.options.iter().any(|o| o.trim().is_empty()) {
        return Err(DomainError::InvalidQuestion("option is empty".to_string()));
    }
    if choice_type && question.options.is_empty() {
        return Err(DomainError::InvalidQuestion(
            "choice questions need options".to_string(),
        ));
    }
    Ok(())
}

/// DTO for starting an assessment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartAssessmentRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_device_id: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[validate(length(max = 64))]
    pub category_id: Option<String>,
    #[validate(length(max = 16))]
    pub language_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAssessmentResponse {
    pub assessment_id: String,
}

/// DTO for submitting an answer to the pending question.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, max = 4000))]
    pub answer: String,
    /// Milliseconds the user spent on the question, as measured by the client.
    pub taken_time: Option<u64>,
}

/// Evaluation of a submitted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub explanation: Option<String>,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub completed: bool,
    pub state: AssessmentState,
    pub phase: String,
}
