// src/models/question.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of answer options a choice question may carry.
pub const MAX_OPTIONS: usize = 4;

/// One question inside an assessment, together with the user's answer once given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// The text content of the question.
    pub content: String,

    /// Answer options, only present for choice-type assessments.
    #[serde(default)]
    pub options: Vec<String>,

    pub correct_answer: String,

    pub user_answer: Option<String>,

    pub is_correct: Option<bool>,

    pub explanation: Option<String>,

    /// Time the user needed to answer, in milliseconds.
    pub taken_time: Option<u64>,

    pub asked_at: DateTime<Utc>,
}

impl Question {
    pub fn new(
        content: String,
        options: Vec<String>,
        correct_answer: String,
        asked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content,
            options,
            correct_answer,
            user_answer: None,
            is_correct: None,
            explanation: None,
            taken_time: None,
            asked_at,
        }
    }

    /// A question is pending until the evaluation of the user's answer has been recorded.
    pub fn is_pending(&self) -> bool {
        self.is_correct.is_none()
    }
}

/// DTO for sending a question to the client (excludes the correct answer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    /// Zero-based position of the question within its assessment.
    pub index: usize,
    pub content: String,
    pub options: Vec<String>,
}

impl PublicQuestion {
    pub fn from_question(index: usize, question: &Question) -> Self {
        Self {
            index,
            content: question.content.clone(),
            options: question.options.clone(),
        }
    }
}
