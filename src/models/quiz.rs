// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::assessment::{Assessment, AssessmentState, Difficulty};

/// Summary of an assessment as rendered by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizModel {
    pub assessment_id: String,
    pub assessment_state: AssessmentState,
    pub user_device_id: String,
    pub category_id: Option<String>,
    pub language_id: Option<String>,
    pub difficulty_at_start: Difficulty,
    pub difficulty_at_end: Difficulty,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub assessment_details: AssessmentDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDetails {
    pub assessment_type_id: String,
    pub assessment_type_name: String,
    pub answered_questions: usize,
    pub correct_answers: usize,
    /// Seconds spent on the assessment.
    pub duration: u64,
    pub questions: Vec<QuizQuestionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionSummary {
    pub content: String,
    pub answers: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub your_answer: Option<String>,
    pub is_correct: Option<bool>,
    /// Milliseconds.
    pub taken_time: Option<u64>,
}

/// Response body of the complete endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub quiz: QuizModel,
}

impl From<&Assessment> for QuizModel {
    fn from(a: &Assessment) -> Self {
        let answered_questions = a.questions.iter().filter(|q| !q.is_pending()).count();
        let correct_answers = a
            .questions
            .iter()
            .filter(|q| q.is_correct == Some(true))
            .count();

        // Wall-clock duration once finished, otherwise the time spent answering so far.
        let duration = match a.end_time {
            Some(end) => (end - a.start_time).num_seconds().max(0) as u64,
            None => a.questions.iter().filter_map(|q| q.taken_time).sum::<u64>() / 1000,
        };

        let questions = a
            .questions
            .iter()
            .map(|q| QuizQuestionSummary {
                content: q.content.clone(),
                answers: q.options.clone(),
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
                your_answer: q.user_answer.clone(),
                is_correct: q.is_correct,
                taken_time: q.taken_time,
            })
            .collect();

        QuizModel {
            assessment_id: a.assessment_id.clone(),
            assessment_state: a.state,
            user_device_id: a.user_device_id.clone(),
            category_id: a.category_id.clone(),
            language_id: a.language_id.clone(),
            difficulty_at_start: a.difficulty_at_start,
            difficulty_at_end: a.difficulty_at_end,
            start_time: a.start_time,
            end_time: a.end_time,
            feedback: a.feedback.clone(),
            assessment_details: AssessmentDetails {
                assessment_type_id: a.assessment_type_id.clone(),
                assessment_type_name: a.assessment_type_name.clone(),
                answered_questions,
                correct_answers,
                duration,
                questions,
            },
        }
    }
}
