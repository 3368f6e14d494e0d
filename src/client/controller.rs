// src/client/controller.rs

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{ClientError, QuizApiClient, RouteParams};
use crate::config::PollSettings;
use crate::models::{
    assessment::{AnswerOutcome, SubmitAnswerRequest},
    question::PublicQuestion,
    quiz::QuizModel,
};

const COMMENT_BUFFER: usize = 32;

/// Screen the quiz page is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    Loading,
    AwaitingQuestion,
    AwaitingAnswer,
    Summary,
}

/// Where the page should go after the user leaves a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Reload,
    Menu,
}

#[derive(Debug)]
struct Session {
    state: QuizState,
    loading: bool,
    current: Option<PublicQuestion>,
    asked_at: Option<Instant>,
    summary: Option<QuizModel>,
}

impl Session {
    fn fresh() -> Self {
        Self {
            state: QuizState::Loading,
            loading: false,
            current: None,
            asked_at: None,
            summary: None,
        }
    }
}

struct Shared {
    api: QuizApiClient,
    route: Mutex<RouteParams>,
    polling: PollSettings,
    session: Mutex<Session>,
    comments: broadcast::Sender<String>,
    completed: watch::Sender<bool>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ids(&self) -> (String, String) {
        let route = self.route.lock().unwrap_or_else(|e| e.into_inner());
        (route.assessment_type_id.clone(), route.assessment_id.clone())
    }

    /// Logs the failure and drops the spinner; the screen stays where it was.
    fn fail<T>(&self, what: &str, err: ClientError) -> Result<T, ClientError> {
        tracing::error!("Failed to {}: {}", what, err);
        self.session().loading = false;
        Err(err)
    }

    fn finish(&self, quiz: QuizModel) {
        {
            let mut session = self.session();
            session.summary = Some(quiz);
            session.state = QuizState::Summary;
            session.current = None;
            session.loading = false;
        }
        self.completed.send_replace(true);
    }

    async fn submit(&self, req: SubmitAnswerRequest) -> Result<AnswerOutcome, ClientError> {
        let (assessment_type, id) = self.ids();
        match self.api.submit_answer(&assessment_type, &id, &req).await {
            Ok(outcome) => {
                if let Some(explanation) = &outcome.explanation {
                    // No subscribers is fine; the comment is simply not shown.
                    let _ = self.comments.send(explanation.clone());
                }
                Ok(outcome)
            }
            Err(e) => self.fail("submit answer", e),
        }
    }

    async fn watch_completion(&self) -> Result<QuizModel, ClientError> {
        let (assessment_type, id) = self.ids();
        for poll in 0..self.polling.max_polls {
            if *self.completed.borrow() {
                if let Some(summary) = self.session().summary.clone() {
                    return Ok(summary);
                }
            }

            match self.api.status(&assessment_type, &id).await {
                Ok(status) if status.completed => {
                    let quiz = match self.api.summary(&assessment_type, &id).await {
                        Ok(quiz) => quiz,
                        Err(e) => return self.fail("fetch summary", e),
                    };
                    self.finish(quiz.clone());
                    return Ok(quiz);
                }
                Ok(_) => tracing::debug!("Assessment {} not completed (poll {})", id, poll + 1),
                Err(e) => tracing::warn!("Status poll for {} failed: {}", id, e),
            }
            tokio::time::sleep(self.polling.interval).await;
        }

        self.fail(
            "wait for completion",
            ClientError::Timeout {
                polls: self.polling.max_polls,
            },
        )
    }
}

/// Drives one quiz page: question display, answer submission, completion
/// polling and the summary screen.
///
/// Spawned work (answer submissions, the completion watcher) is aborted when
/// the controller is dropped or the user navigates away.
pub struct QuizController {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl QuizController {
    pub fn new(api: QuizApiClient, route: RouteParams, polling: PollSettings) -> Self {
        let (comments, _) = broadcast::channel(COMMENT_BUFFER);
        let (completed, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                api,
                route: Mutex::new(route),
                polling,
                session: Mutex::new(Session::fresh()),
                comments,
                completed,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Parses the page URL and builds a controller for it.
    pub fn from_url(
        api: QuizApiClient,
        url: &str,
        polling: PollSettings,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(api, RouteParams::parse(url)?, polling))
    }

    pub fn state(&self) -> QuizState {
        self.shared.session().state
    }

    pub fn is_loading(&self) -> bool {
        self.shared.session().loading
    }

    pub fn current_question(&self) -> Option<PublicQuestion> {
        self.shared.session().current.clone()
    }

    pub fn summary(&self) -> Option<QuizModel> {
        self.shared.session().summary.clone()
    }

    pub fn route(&self) -> RouteParams {
        self.shared
            .route
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stream of assistant explanations, one per evaluated answer.
    pub fn bot_comments(&self) -> broadcast::Receiver<String> {
        self.shared.comments.subscribe()
    }

    /// Flips to `true` once the summary is available.
    pub fn completion(&self) -> watch::Receiver<bool> {
        self.shared.completed.subscribe()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Leaves `loading` and starts watching for completion in the background.
    pub fn start(&self) {
        {
            let mut session = self.shared.session();
            if session.state == QuizState::Loading {
                session.state = QuizState::AwaitingQuestion;
            }
        }

        let shared = self.shared.clone();
        self.track(tokio::spawn(async move {
            // Failures are logged inside.
            let _ = shared.watch_completion().await;
        }));
    }

    /// Asks the backend for the next question.
    pub async fn next_question(&self) -> Result<PublicQuestion, ClientError> {
        {
            let mut guard = self.shared.session();
            let session = &mut *guard;
            match (session.state, &session.current) {
                (QuizState::AwaitingQuestion, _) => session.loading = true,
                // Already asked and not answered yet.
                (QuizState::AwaitingAnswer, Some(current)) => return Ok(current.clone()),
                (state, _) => return Err(ClientError::InvalidState(state)),
            }
        }

        let (assessment_type, id) = self.shared.ids();
        let question = match self.shared.api.next_question(&assessment_type, &id).await {
            Ok(question) => question,
            Err(e) => return self.shared.fail("load question", e),
        };

        let mut session = self.shared.session();
        session.current = Some(question.clone());
        session.asked_at = Some(Instant::now());
        session.state = QuizState::AwaitingAnswer;
        session.loading = false;
        Ok(question)
    }

    fn take_answer(&self, answer: String) -> Option<SubmitAnswerRequest> {
        let mut session = self.shared.session();
        if session.state != QuizState::AwaitingAnswer {
            tracing::warn!("Answer submitted while {:?}", session.state);
            return None;
        }
        let taken_time = session
            .asked_at
            .take()
            .map(|at| at.elapsed().as_millis() as u64);
        session.current = None;
        session.state = QuizState::AwaitingQuestion;
        Some(SubmitAnswerRequest { answer, taken_time })
    }

    /// Sends the answer without waiting for the evaluation. The explanation
    /// arrives later on [`bot_comments`](Self::bot_comments).
    pub fn on_answer_submitted(&self, answer: String) {
        let Some(req) = self.take_answer(answer) else {
            return;
        };
        let shared = self.shared.clone();
        self.track(tokio::spawn(async move {
            let _ = shared.submit(req).await;
        }));
    }

    /// Like [`on_answer_submitted`](Self::on_answer_submitted) but waits for the outcome.
    pub async fn submit_answer(&self, answer: String) -> Result<AnswerOutcome, ClientError> {
        let req = self
            .take_answer(answer)
            .ok_or_else(|| ClientError::InvalidState(self.state()))?;
        self.shared.submit(req).await
    }

    /// The user finished the last question: finalize and show the summary.
    pub async fn on_quiz_completed(&self) -> Result<QuizModel, ClientError> {
        self.shared.session().loading = true;
        let (assessment_type, id) = self.shared.ids();
        match self.shared.api.complete(&assessment_type, &id).await {
            Ok(quiz) => {
                self.shared.finish(quiz.clone());
                Ok(quiz)
            }
            Err(e) => self.shared.fail("complete assessment", e),
        }
    }

    /// Polls until the backend reports completion, then loads the summary.
    pub async fn watch_completion(&self) -> Result<QuizModel, ClientError> {
        self.shared.watch_completion().await
    }

    fn reset(&self) {
        self.abort_tasks();
        *self.shared.session() = Session::fresh();
        self.shared.completed.send_replace(false);
    }

    pub fn on_replay_quiz(&self) -> Navigation {
        self.reset();
        Navigation::Reload
    }

    pub fn on_return_to_menu(&self) -> Navigation {
        self.reset();
        self.shared
            .route
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .questions
            .clear();
        Navigation::Menu
    }

    fn abort_tasks(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for QuizController {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
