// src/orchestrator/phase.rs

use crate::models::assessment::Assessment;

/// Where an assessment stands in the question/answer/feedback workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Created,
    AwaitingAnswer,
    Evaluating,
    DifficultyAdjusted,
    FeedbackPending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    QuestionRecorded,
    AnswerSubmitted,
    AnswerEvaluated,
    DifficultyAdjusted,
    FeedbackRequested,
    FeedbackRecorded,
    /// The assistant run finished, successfully or not.
    RunSettled,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Created => "created",
            WorkflowPhase::AwaitingAnswer => "awaiting_answer",
            WorkflowPhase::Evaluating => "evaluating",
            WorkflowPhase::DifficultyAdjusted => "difficulty_adjusted",
            WorkflowPhase::FeedbackPending => "feedback_pending",
            WorkflowPhase::Completed => "completed",
        }
    }

    /// Best guess for an assessment whose phase is not tracked (e.g. after a restart).
    pub fn infer(assessment: &Assessment) -> Self {
        if assessment.is_completed() {
            WorkflowPhase::Completed
        } else if assessment.questions.is_empty() {
            WorkflowPhase::Created
        } else {
            WorkflowPhase::AwaitingAnswer
        }
    }
}

/// Pure transition function. `Completed` is absorbing.
pub fn transition(phase: WorkflowPhase, event: PhaseEvent) -> WorkflowPhase {
    use PhaseEvent as E;
    use WorkflowPhase as P;

    match (phase, event) {
        (P::Completed, _) => P::Completed,
        (_, E::FeedbackRecorded) => P::Completed,
        (_, E::FeedbackRequested) => P::FeedbackPending,
        // Effects applied while wrapping up do not reopen the question loop.
        (P::FeedbackPending, E::QuestionRecorded | E::AnswerEvaluated | E::DifficultyAdjusted) => {
            P::FeedbackPending
        }
        (P::Evaluating | P::FeedbackPending, E::RunSettled) => P::AwaitingAnswer,
        (p, E::RunSettled) => p,
        (_, E::QuestionRecorded) => P::AwaitingAnswer,
        (_, E::AnswerSubmitted) => P::Evaluating,
        (_, E::AnswerEvaluated) => P::AwaitingAnswer,
        (_, E::DifficultyAdjusted) => P::DifficultyAdjusted,
    }
}
