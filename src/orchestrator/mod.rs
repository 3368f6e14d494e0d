// src/orchestrator/mod.rs

//! The assessment workflow: start, ask, answer, finish.
//!
//! Every operation drives one assistant run to its end inside the calling request.
//! Tool calls requested by the run are applied to the store as they arrive; nothing is
//! rolled back when the run later fails.

pub mod assistant;
pub mod phase;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::PollSettings,
    models::{
        assessment::{
            AnswerOutcome, Assessment, DomainError, StartAssessmentRequest, StatusResponse,
        },
        question::{PublicQuestion, Question},
        quiz::QuizModel,
        user::NewUser,
    },
    provider::{
        AssistantApi, ProviderError, RequestedToolCall, RunStatus, ToolOutput,
        tools::ToolCall,
    },
    store::{AssessmentStore, AssessmentTypeStore, StoreError, UserStore},
    utils::html::clean_html,
};

use self::phase::{PhaseEvent, WorkflowPhase, transition};

const TOOL_OK: &str = "true";
const TOOL_REJECTED: &str = "false";

/// Instructions the assistant is created with when none is configured.
pub const ASSISTANT_INSTRUCTIONS: &str = "You run adaptive assessments. Ask one question at a \
    time with generateQuestions, judge every user answer with handleUserInput, tune the level \
    with adjustDifficulty, and when asked to finish, read the assessment with \
    retrieveAssessment and conclude with feedback. Only communicate through these functions.";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("evaluation failed ({status:?}): {message}")]
    EvaluationFailed { status: RunStatus, message: String },
    #[error("assistant run still unfinished after {polls} polls")]
    Timeout { polls: u32 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => OrchestratorError::NotFound(what),
            StoreError::Conflict(what) => OrchestratorError::Conflict(format!("{} already exists", what)),
            other => OrchestratorError::Store(other),
        }
    }
}

type Result<T> = std::result::Result<T, OrchestratorError>;

/// The stores the workflow reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub assessments: Arc<dyn AssessmentStore>,
    pub users: Arc<dyn UserStore>,
    pub types: Arc<dyn AssessmentTypeStore>,
}

/// What the current run has done so far, for the operation that started it.
#[derive(Debug, Default)]
struct RunContext {
    assessment_id: String,
    submitted_answer: Option<String>,
    taken_time: Option<u64>,
    answered: Option<usize>,
    recorded: Vec<usize>,
}

impl RunContext {
    fn new(assessment_id: &str) -> Self {
        Self {
            assessment_id: assessment_id.to_string(),
            ..Default::default()
        }
    }
}

pub struct AssessmentOrchestrator {
    stores: Stores,
    provider: Arc<dyn AssistantApi>,
    assistant_id: String,
    polling: PollSettings,
    phases: Mutex<HashMap<String, WorkflowPhase>>,
}

impl AssessmentOrchestrator {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn AssistantApi>,
        assistant_id: String,
        polling: PollSettings,
    ) -> Self {
        Self {
            stores,
            provider,
            assistant_id,
            polling,
            phases: Mutex::new(HashMap::new()),
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Creates the assessment, opens its thread and briefs the assistant.
    pub async fn start_assessment(
        &self,
        assessment_type_id: &str,
        req: StartAssessmentRequest,
    ) -> Result<String> {
        let assessment_type = self
            .stores
            .types
            .find(assessment_type_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!("assessment type '{}'", assessment_type_id))
            })?;

        self.ensure_user(&req.user_device_id).await?;

        let mut assessment = Assessment::new(
            Uuid::new_v4().to_string(),
            assessment_type.id,
            assessment_type.name,
            req.user_device_id,
            req.difficulty.unwrap_or_default(),
            Utc::now(),
        );
        assessment.category_id = req.category_id;
        assessment.language_id = req.language_id;

        let thread = self.provider.create_thread().await?;
        assessment.thread_id = Some(thread.id.clone());
        self.stores.assessments.save(&assessment).await?;
        self.set_phase(&assessment.assessment_id, WorkflowPhase::Created);

        self.provider
            .add_message(&thread.id, &opening_message(&assessment))
            .await?;

        tracing::info!(
            "Assessment {} started ({}, device {})",
            assessment.assessment_id,
            assessment.assessment_type_id,
            assessment.user_device_id
        );
        Ok(assessment.assessment_id)
    }

    /// Asks the assistant for the next question and returns it without its answer.
    pub async fn request_question(&self, assessment_id: &str) -> Result<PublicQuestion> {
        let assessment = self.load_open(assessment_id).await?;
        if let Some(index) = assessment.pending_question_index() {
            tracing::debug!("Question {} of {} is still open", index, assessment_id);
            return Ok(PublicQuestion::from_question(
                index,
                &assessment.questions[index],
            ));
        }
        let thread_id = thread_of(&assessment)?;

        let prompt = format!(
            "Generate the next question. Current difficulty: {}.",
            assessment.difficulty_at_end
        );
        let mut ctx = RunContext::new(assessment_id);
        let outcome = self.converse(&thread_id, &prompt, &mut ctx).await;
        let assessment = self.settle(assessment_id).await?;
        outcome?;

        let index = ctx.recorded.last().copied().ok_or_else(|| {
            OrchestratorError::EvaluationFailed {
                status: RunStatus::Completed,
                message: "assistant did not record a question".to_string(),
            }
        })?;
        let question = assessment.questions.get(index).ok_or_else(|| {
            OrchestratorError::NotFound(format!("question {} of {}", index, assessment_id))
        })?;
        Ok(PublicQuestion::from_question(index, question))
    }

    /// Forwards the user's answer and lets the assistant evaluate it.
    pub async fn submit_answer(
        &self,
        assessment_id: &str,
        answer: String,
        taken_time: Option<u64>,
    ) -> Result<AnswerOutcome> {
        let assessment = self.load_open(assessment_id).await?;
        let thread_id = thread_of(&assessment)?;
        let pending = assessment.pending_question_index().ok_or_else(|| {
            OrchestratorError::Validation(DomainError::NoPendingQuestion.to_string())
        })?;

        let taken_time = taken_time.unwrap_or_else(|| {
            let asked_at = assessment.questions[pending].asked_at;
            (Utc::now() - asked_at).num_milliseconds().max(0) as u64
        });

        let prompt = format!("My answer: {}", answer);
        let mut ctx = RunContext::new(assessment_id);
        ctx.submitted_answer = Some(answer);
        ctx.taken_time = Some(taken_time);

        self.advance(&assessment, PhaseEvent::AnswerSubmitted);
        let outcome = self.converse(&thread_id, &prompt, &mut ctx).await;
        let assessment = self.settle(assessment_id).await?;
        if let Err(err) = outcome {
            tracing::warn!("Evaluation of {} failed: {}", assessment_id, err);
            return Err(err);
        }

        match ctx.answered.and_then(|i| assessment.questions.get(i)) {
            Some(question) => Ok(AnswerOutcome {
                explanation: question.explanation.clone(),
                is_correct: question.is_correct,
            }),
            None => {
                // The assistant replied in prose instead of calling handleUserInput.
                let explanation = self.latest_assistant_text(&thread_id).await?;
                Ok(AnswerOutcome {
                    explanation,
                    is_correct: None,
                })
            }
        }
    }

    /// Asks the assistant for final feedback and returns the resulting summary.
    pub async fn complete_assessment(&self, assessment_id: &str) -> Result<QuizModel> {
        let assessment = self.load(assessment_id).await?;
        if assessment.is_completed() {
            return Ok(QuizModel::from(&assessment));
        }
        let thread_id = thread_of(&assessment)?;

        let prompt = format!(
            "The assessment {} is finished. Call retrieveAssessment, then feedback.",
            assessment_id
        );
        let mut ctx = RunContext::new(assessment_id);

        self.advance(&assessment, PhaseEvent::FeedbackRequested);
        let outcome = self.converse(&thread_id, &prompt, &mut ctx).await;
        let assessment = self.settle(assessment_id).await?;
        outcome?;

        if !assessment.is_completed() {
            tracing::warn!("Run for {} finished without feedback", assessment_id);
        }
        Ok(QuizModel::from(&assessment))
    }

    pub async fn get_status(&self, assessment_id: &str) -> Result<StatusResponse> {
        let assessment = self.load(assessment_id).await?;
        Ok(StatusResponse {
            completed: assessment.is_completed(),
            state: assessment.state,
            phase: self.phase_of(&assessment).as_str().to_string(),
        })
    }

    pub async fn get_summary(&self, assessment_id: &str) -> Result<QuizModel> {
        let assessment = self.load(assessment_id).await?;
        Ok(QuizModel::from(&assessment))
    }

    /// Loads an assessment, failing with `NotFound` unless it has the given type.
    pub async fn load_of_type(
        &self,
        assessment_type_id: &str,
        assessment_id: &str,
    ) -> Result<Assessment> {
        let assessment = self.load(assessment_id).await?;
        if assessment.assessment_type_id != assessment_type_id {
            return Err(OrchestratorError::NotFound(format!(
                "{} assessment {}",
                assessment_type_id, assessment_id
            )));
        }
        Ok(assessment)
    }

    /// Posts `prompt` and drives the run it triggers. Callers settle the phase
    /// whatever the outcome.
    async fn converse(&self, thread_id: &str, prompt: &str, ctx: &mut RunContext) -> Result<()> {
        self.provider.add_message(thread_id, prompt).await?;
        self.execute_run(thread_id, ctx).await
    }

    /// Drives a run until it completes, applying tool calls along the way.
    async fn execute_run(&self, thread_id: &str, ctx: &mut RunContext) -> Result<()> {
        let mut run = self
            .provider
            .run_assistant(thread_id, &self.assistant_id)
            .await?;
        let mut polls = 0;

        loop {
            if run.status.is_terminal() {
                if run.status == RunStatus::Completed {
                    return Ok(());
                }
                let message = run
                    .last_error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "no error reported".to_string());
                return Err(OrchestratorError::EvaluationFailed {
                    status: run.status,
                    message,
                });
            }

            if polls >= self.polling.max_polls {
                return Err(OrchestratorError::Timeout { polls });
            }
            polls += 1;

            run = if run.status == RunStatus::RequiresAction {
                let outputs = self.dispatch_all(ctx, run.pending_tool_calls()).await?;
                self.provider
                    .submit_tool_outputs(thread_id, &run.id, &outputs)
                    .await?
            } else {
                tokio::time::sleep(self.polling.interval).await;
                self.provider.get_run_status(thread_id, &run.id).await?
            };
        }
    }

    async fn dispatch_all(
        &self,
        ctx: &mut RunContext,
        calls: &[RequestedToolCall],
    ) -> Result<Vec<ToolOutput>> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let output = match ToolCall::try_from(&call.function) {
                Ok(tool) => self.apply(ctx, tool).await?,
                Err(e) => {
                    tracing::warn!("Rejected tool call {}: {}", call.id, e);
                    TOOL_REJECTED.to_string()
                }
            };
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        Ok(outputs)
    }

    /// Applies one tool call and returns the output reported back to the assistant.
    async fn apply(&self, ctx: &mut RunContext, tool: ToolCall) -> Result<String> {
        let mut assessment = self.load(&ctx.assessment_id).await?;
        let name = tool.name();

        let applied = match tool {
            ToolCall::GenerateQuestions(args) => {
                let question = Question::new(
                    args.content.trim().to_string(),
                    args.options.iter().map(|o| o.trim().to_string()).collect(),
                    args.correct_answer.trim().to_string(),
                    Utc::now(),
                );
                match assessment.record_question(question.clone()) {
                    Ok(index) => {
                        self.stores
                            .assessments
                            .append_question(&ctx.assessment_id, &question)
                            .await?;
                        ctx.recorded.push(index);
                        Ok(PhaseEvent::QuestionRecorded)
                    }
                    Err(e) => Err(e),
                }
            }
            ToolCall::HandleUserInput(args) => {
                let answer = args
                    .user_answer
                    .filter(|a| !a.trim().is_empty())
                    .or_else(|| ctx.submitted_answer.clone());
                let taken_time = ctx.taken_time.unwrap_or_else(|| {
                    assessment
                        .pending_question_index()
                        .map(|i| {
                            (Utc::now() - assessment.questions[i].asked_at)
                                .num_milliseconds()
                                .max(0) as u64
                        })
                        .unwrap_or(0)
                });
                match answer {
                    Some(answer) => assessment
                        .answer_pending(
                            answer,
                            args.is_correct,
                            args.explanation.trim().to_string(),
                            taken_time,
                        )
                        .map(|index| {
                            ctx.answered = Some(index);
                            PhaseEvent::AnswerEvaluated
                        }),
                    None => Err(DomainError::NoPendingQuestion),
                }
            }
            ToolCall::AdjustDifficulty(args) => assessment
                .adjust_difficulty(args.adjusted_difficulty)
                .map(|_| PhaseEvent::DifficultyAdjusted),
            ToolCall::Feedback(args) => assessment
                .complete(args.feedback.trim().to_string(), Utc::now())
                .map(|_| PhaseEvent::FeedbackRecorded),
            ToolCall::RetrieveAssessment(args) => {
                if let Some(requested) = args.assessment_id.as_deref() {
                    if requested != ctx.assessment_id {
                        tracing::debug!(
                            "retrieveAssessment asked for {}, serving {}",
                            requested,
                            ctx.assessment_id
                        );
                    }
                }
                return Ok(serde_json::to_string(&assessment)
                    .unwrap_or_else(|_| TOOL_REJECTED.to_string()));
            }
        };

        match applied {
            Ok(event) => {
                // Questions are appended above; every other effect needs a full save.
                if event != PhaseEvent::QuestionRecorded {
                    self.stores.assessments.save(&assessment).await?;
                }
                self.advance(&assessment, event);
                tracing::debug!("Applied {} to {}", name, ctx.assessment_id);
                Ok(TOOL_OK.to_string())
            }
            Err(e) => {
                tracing::warn!("{} rejected for {}: {}", name, ctx.assessment_id, e);
                Ok(TOOL_REJECTED.to_string())
            }
        }
    }

    async fn latest_assistant_text(&self, thread_id: &str) -> Result<Option<String>> {
        let messages = self.provider.list_messages(thread_id).await?;
        // The provider lists newest first. Message bodies may carry markup, unlike
        // tool arguments, so they go through the HTML cleaner.
        Ok(messages
            .iter()
            .find(|m| m.role == "assistant")
            .map(|m| clean_html(&m.text()))
            .filter(|t| !t.is_empty()))
    }

    /// Marks the end of a run and returns the freshly persisted record.
    async fn settle(&self, assessment_id: &str) -> Result<Assessment> {
        let assessment = self.load(assessment_id).await?;
        self.advance(&assessment, PhaseEvent::RunSettled);
        Ok(assessment)
    }

    async fn ensure_user(&self, device_id: &str) -> Result<()> {
        let user = match self.stores.users.find_by_device_id(device_id).await? {
            Some(user) => user,
            None => {
                tracing::info!("Registering new device {}", device_id);
                match self
                    .stores
                    .users
                    .save(NewUser::active(device_id, device_id))
                    .await
                {
                    Ok(user) => user,
                    // Registered concurrently by another request.
                    Err(StoreError::Conflict(_)) => self
                        .stores
                        .users
                        .find_by_device_id(device_id)
                        .await?
                        .ok_or_else(|| OrchestratorError::NotFound(format!("device {}", device_id)))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if user.status != "active" {
            return Err(OrchestratorError::Conflict(format!(
                "user {} is {}",
                user.id, user.status
            )));
        }
        Ok(())
    }

    async fn load(&self, assessment_id: &str) -> Result<Assessment> {
        self.stores
            .assessments
            .load(assessment_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("assessment {}", assessment_id)))
    }

    async fn load_open(&self, assessment_id: &str) -> Result<Assessment> {
        let assessment = self.load(assessment_id).await?;
        if assessment.is_completed() {
            return Err(OrchestratorError::Conflict(format!(
                "assessment {} is already completed",
                assessment_id
            )));
        }
        Ok(assessment)
    }

    fn phase_of(&self, assessment: &Assessment) -> WorkflowPhase {
        let phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        phases
            .get(&assessment.assessment_id)
            .copied()
            .unwrap_or_else(|| WorkflowPhase::infer(assessment))
    }

    /// Completed assessments are dropped from the map; `infer` recovers them.
    fn set_phase(&self, assessment_id: &str, phase: WorkflowPhase) {
        let mut phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        if phase == WorkflowPhase::Completed {
            phases.remove(assessment_id);
        } else {
            phases.insert(assessment_id.to_string(), phase);
        }
    }

    fn advance(&self, assessment: &Assessment, event: PhaseEvent) {
        let next = transition(self.phase_of(assessment), event);
        self.set_phase(&assessment.assessment_id, next);
    }
}

fn thread_of(assessment: &Assessment) -> Result<String> {
    assessment.thread_id.clone().ok_or_else(|| {
        OrchestratorError::Conflict(format!(
            "assessment {} has no assistant thread",
            assessment.assessment_id
        ))
    })
}

fn opening_message(assessment: &Assessment) -> String {
    let mut message = format!(
        "Start an assessment. assessmentId: {}. assessmentTypeName: {}. Difficulty: {}.",
        assessment.assessment_id, assessment.assessment_type_name, assessment.difficulty_at_start
    );
    if let Some(category) = &assessment.category_id {
        message.push_str(&format!(" Category: {}.", category));
    }
    if let Some(language) = &assessment.language_id {
        message.push_str(&format!(" Answer in language: {}.", language));
    }
    message
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        models::assessment::{AssessmentState, Difficulty},
        provider::scripted::{ScriptedProvider, Step},
        store::{MemoryAssessmentStore, MemoryAssessmentTypeStore, MemoryUserStore},
    };

    struct Harness {
        provider: Arc<ScriptedProvider>,
        orchestrator: AssessmentOrchestrator,
    }

    fn harness() -> Harness {
        let provider = Arc::new(ScriptedProvider::new());
        let stores = Stores {
            assessments: Arc::new(MemoryAssessmentStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            types: Arc::new(MemoryAssessmentTypeStore::default()),
        };
        let orchestrator = AssessmentOrchestrator::new(
            stores,
            provider.clone(),
            "asst_test".to_string(),
            PollSettings {
                interval: Duration::from_millis(1),
                max_polls: 10,
            },
        );
        Harness {
            provider,
            orchestrator,
        }
    }

    fn start_request(device: &str) -> StartAssessmentRequest {
        StartAssessmentRequest {
            user_device_id: device.to_string(),
            difficulty: None,
            category_id: None,
            language_id: None,
        }
    }

    async fn load(h: &Harness, id: &str) -> Assessment {
        h.orchestrator.load(id).await.unwrap()
    }

    /// Starts an open-question assessment with one pending "2+2?" question.
    async fn with_pending_question(h: &Harness) -> String {
        let id = h
            .orchestrator
            .start_assessment("open_question", start_request("user-1"))
            .await
            .unwrap();
        h.provider.push_run(vec![Step::tool(
            "generateQuestions",
            json!({"content": "2+2?", "correctAnswer": "4"}),
        )]);
        h.orchestrator.request_question(&id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_start_assessment_is_in_progress() {
        let h = harness();
        let id = h
            .orchestrator
            .start_assessment("quiz", start_request("user-1"))
            .await
            .unwrap();

        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert_eq!(status.state, AssessmentState::InProgress);
        assert!(!status.completed);
        assert_eq!(status.phase, "created");

        let a = load(&h, &id).await;
        assert_eq!(a.thread_id.as_deref(), Some("thread_1"));
        assert!(a.end_time.is_none() && a.feedback.is_none());

        let messages = h.provider.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.contains(&id));

        let user = h
            .orchestrator
            .stores()
            .users
            .find_by_device_id("user-1")
            .await
            .unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_start_unknown_type_is_not_found() {
        let h = harness();
        let err = h
            .orchestrator
            .start_assessment("poetry", start_request("user-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_generate_questions_appends_question() {
        let h = harness();
        let id = with_pending_question(&h).await;

        let a = load(&h, &id).await;
        assert_eq!(a.questions.len(), 1);
        assert_eq!(a.questions[0].content, "2+2?");
        assert_eq!(a.questions[0].correct_answer, "4");
        assert!(a.questions[0].user_answer.is_none());

        let outputs = h.provider.outputs();
        assert_eq!(outputs[0].0, "generateQuestions");
        assert_eq!(outputs[0].1.output, "true");

        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert_eq!(status.phase, "awaiting_answer");
    }

    #[tokio::test]
    async fn test_invalid_question_is_answered_false() {
        let h = harness();
        let id = h
            .orchestrator
            .start_assessment("quiz", start_request("user-1"))
            .await
            .unwrap();
        h.provider.push_run(vec![
            Step::tool(
                "generateQuestions",
                json!({"content": "2+2?", "correctAnswer": "4"}),
            ),
            Step::tool(
                "generateQuestions",
                json!({"content": "2+2?", "options": ["3", "4"], "correctAnswer": "4"}),
            ),
        ]);

        let question = h.orchestrator.request_question(&id).await.unwrap();
        assert_eq!(question.index, 0);
        assert_eq!(question.options, vec!["3".to_string(), "4".to_string()]);

        let outputs: Vec<String> = h.provider.outputs().into_iter().map(|o| o.1.output).collect();
        assert_eq!(outputs, vec!["false", "true"]);
        assert_eq!(load(&h, &id).await.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_answer_records_evaluation() {
        let h = harness();
        let id = with_pending_question(&h).await;

        h.provider.push_run(vec![
            Step::Status(RunStatus::InProgress),
            Step::tool(
                "handleUserInput",
                json!({"isCorrect": true, "explanation": "Correct"}),
            ),
        ]);
        let outcome = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), Some(2500))
            .await
            .unwrap();
        assert_eq!(outcome.is_correct, Some(true));
        assert_eq!(outcome.explanation.as_deref(), Some("Correct"));

        let q = &load(&h, &id).await.questions[0];
        assert_eq!(q.user_answer.as_deref(), Some("4"));
        assert_eq!(q.is_correct, Some(true));
        assert_eq!(q.explanation.as_deref(), Some("Correct"));
        assert_eq!(q.taken_time, Some(2500));
    }

    #[tokio::test]
    async fn test_answer_never_touches_earlier_questions() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.push_run(vec![Step::Tools(vec![
            (
                "handleUserInput".to_string(),
                json!({"userAnswer": "4", "isCorrect": true, "explanation": "Yes"}),
            ),
            (
                "generateQuestions".to_string(),
                json!({"content": "3+3?", "correctAnswer": "6"}),
            ),
        ])]);
        h.orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap();

        h.provider.push_run(vec![Step::tool(
            "handleUserInput",
            json!({"userAnswer": "7", "isCorrect": false, "explanation": "It is 6"}),
        )]);
        h.orchestrator
            .submit_answer(&id, "7".to_string(), None)
            .await
            .unwrap();

        let a = load(&h, &id).await;
        assert_eq!(a.questions[0].user_answer.as_deref(), Some("4"));
        assert_eq!(a.questions[0].is_correct, Some(true));
        assert_eq!(a.questions[1].user_answer.as_deref(), Some("7"));
        assert_eq!(a.questions[1].is_correct, Some(false));
    }

    #[tokio::test]
    async fn test_adjust_difficulty_changes_only_end() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.push_run(vec![Step::Tools(vec![
            (
                "handleUserInput".to_string(),
                json!({"isCorrect": true, "explanation": "Yes"}),
            ),
            (
                "adjustDifficulty".to_string(),
                json!({"adjustedDifficulty": "advanced"}),
            ),
        ])]);
        h.orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap();

        let a = load(&h, &id).await;
        assert_eq!(a.difficulty_at_start, Difficulty::Beginner);
        assert_eq!(a.difficulty_at_end, Difficulty::Advanced);
        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert_eq!(status.phase, "difficulty_adjusted");
    }

    #[tokio::test]
    async fn test_feedback_completes_assessment() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.push_run(vec![
            Step::tool("retrieveAssessment", json!({"assessmentId": id})),
            Step::tool("feedback", json!({"feedback": "Good job"})),
        ]);

        let quiz = h.orchestrator.complete_assessment(&id).await.unwrap();
        assert_eq!(quiz.assessment_state, AssessmentState::Completed);
        assert_eq!(quiz.feedback.as_deref(), Some("Good job"));
        assert!(quiz.end_time.is_some());

        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert!(status.completed);
        assert_eq!(status.phase, "completed");

        let outputs = h.provider.outputs();
        let snapshot: serde_json::Value = serde_json::from_str(&outputs[1].1.output).unwrap();
        assert_eq!(snapshot["assessmentId"], id.as_str());
        assert_eq!(snapshot["state"], "in_progress");

        // Further answers are refused and the record stays frozen.
        let err = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_second_feedback_is_rejected() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.push_run(vec![Step::Tools(vec![
            ("feedback".to_string(), json!({"feedback": "First"})),
            ("feedback".to_string(), json!({"feedback": "Second"})),
        ])]);
        h.orchestrator.complete_assessment(&id).await.unwrap();

        let a = load(&h, &id).await;
        assert_eq!(a.feedback.as_deref(), Some("First"));
        let outputs: Vec<String> = h.provider.outputs().into_iter().map(|o| o.1.output).collect();
        assert_eq!(outputs[1..], ["true".to_string(), "false".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_run_leaves_assessment_untouched() {
        let h = harness();
        let id = with_pending_question(&h).await;
        let before = load(&h, &id).await;

        h.provider.push_run(vec![
            Step::Status(RunStatus::InProgress),
            Step::Failed("model overloaded".to_string()),
        ]);
        let err = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap_err();
        match err {
            OrchestratorError::EvaluationFailed { status, message } => {
                assert_eq!(status, RunStatus::Failed);
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(load(&h, &id).await, before);
        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert_eq!(status.phase, "awaiting_answer");
    }

    #[tokio::test]
    async fn test_stuck_run_times_out() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider
            .push_run(vec![Step::Status(RunStatus::InProgress); 50]);

        let err = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Timeout { polls: 10 }));
    }

    #[tokio::test]
    async fn test_provider_error_surfaces() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.push_run(vec![Step::Error {
            status: 500,
            body: "boom".to_string(),
        }]);

        let err = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Provider(ProviderError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_answered_false() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider
            .push_run(vec![Step::tool("dropTables", json!({}))]);

        let outcome = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap();
        assert_eq!(outcome.is_correct, None);
        let outputs = h.provider.outputs();
        assert_eq!(outputs.last().unwrap().1.output, "false");
        assert!(load(&h, &id).await.questions[0].is_pending());
    }

    #[tokio::test]
    async fn test_submit_without_question_is_rejected() {
        let h = harness();
        let id = h
            .orchestrator
            .start_assessment("open_question", start_request("user-1"))
            .await
            .unwrap();
        let err = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_tool_arguments_are_stored_verbatim() {
        let h = harness();
        let id = h
            .orchestrator
            .start_assessment("open_question", start_request("user-1"))
            .await
            .unwrap();
        h.provider.push_run(vec![Step::tool(
            "generateQuestions",
            json!({
                "content": "What does `a < b && c` return for Vec<u8>?",
                "correctAnswer": "a bool & nothing else",
            }),
        )]);
        let question = h.orchestrator.request_question(&id).await.unwrap();
        assert_eq!(question.content, "What does `a < b && c` return for Vec<u8>?");

        h.provider.push_run(vec![Step::tool(
            "handleUserInput",
            json!({"isCorrect": false, "explanation": "  `a < b` yields bool & so does `&&`  "}),
        )]);
        let outcome = h
            .orchestrator
            .submit_answer(&id, "a Vec<u8>".to_string(), None)
            .await
            .unwrap();
        assert_eq!(
            outcome.explanation.as_deref(),
            Some("`a < b` yields bool & so does `&&`")
        );

        let q = &load(&h, &id).await.questions[0];
        assert_eq!(q.content, "What does `a < b && c` return for Vec<u8>?");
        assert_eq!(q.correct_answer, "a bool & nothing else");
        assert_eq!(q.user_answer.as_deref(), Some("a Vec<u8>"));
    }

    #[tokio::test]
    async fn test_failed_answer_message_settles_phase() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.fail_next_message(500, "down");

        let err = h
            .orchestrator
            .submit_answer(&id, "4".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Provider(ProviderError::Status { status: 500, .. })
        ));

        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert_eq!(status.phase, "awaiting_answer");
        assert!(load(&h, &id).await.questions[0].is_pending());
    }

    #[tokio::test]
    async fn test_failed_feedback_message_settles_phase() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.fail_next_message(503, "unavailable");

        let err = h.orchestrator.complete_assessment(&id).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Provider(ProviderError::Status { status: 503, .. })
        ));

        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert!(!status.completed);
        assert_eq!(status.phase, "awaiting_answer");
    }

    #[tokio::test]
    async fn test_completed_assessment_leaves_phase_map() {
        let h = harness();
        let id = with_pending_question(&h).await;
        assert!(h.orchestrator.phases.lock().unwrap().contains_key(&id));

        h.provider
            .push_run(vec![Step::tool("feedback", json!({"feedback": "Done"}))]);
        h.orchestrator.complete_assessment(&id).await.unwrap();

        assert!(!h.orchestrator.phases.lock().unwrap().contains_key(&id));
        let status = h.orchestrator.get_status(&id).await.unwrap();
        assert_eq!(status.phase, "completed");
    }

    #[tokio::test]
    async fn test_prose_reply_becomes_explanation() {
        let h = harness();
        let id = with_pending_question(&h).await;
        h.provider.push_run(vec![
            Step::Reply("Thinking".to_string()),
            Step::Reply("Close, but <b>4</b> is right<script>x</script>".to_string()),
        ]);

        let outcome = h
            .orchestrator
            .submit_answer(&id, "5".to_string(), None)
            .await
            .unwrap();
        assert_eq!(outcome.is_correct, None);
        assert_eq!(
            outcome.explanation.as_deref(),
            Some("Close, but <b>4</b> is right")
        );
        assert!(load(&h, &id).await.questions[0].is_pending());
    }

    #[tokio::test]
    async fn test_pending_question_is_returned_again() {
        let h = harness();
        let id = with_pending_question(&h).await;
        let posted = h.provider.messages().len();

        let question = h.orchestrator.request_question(&id).await.unwrap();
        assert_eq!(question.index, 0);
        assert_eq!(question.content, "2+2?");

        assert_eq!(h.provider.messages().len(), posted);
        assert_eq!(load(&h, &id).await.questions.len(), 1);
    }
}
