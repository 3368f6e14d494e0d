// src/provider/scripted.rs

//! In-process `AssistantApi` that replays canned runs instead of calling out.
//!
//! Each `run_assistant` call takes the next queued script; every following
//! `get_run_status` / `submit_tool_outputs` call returns the next step of that script.
//! When a script runs dry the run reports `completed`. `list_messages` answers newest
//! first, like the hosted API.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    Assistant, AssistantApi, Deleted, FunctionCall, Message, MessageContent, MessageText,
    ProviderError, RequestedToolCall, RequiredAction, Run, RunError, RunStatus,
    SubmitToolOutputs, Thread, ToolOutput,
};

/// One response of a scripted run.
#[derive(Debug, Clone)]
pub enum Step {
    Status(RunStatus),
    /// `requires_action` with the given `(function name, arguments)` calls.
    Tools(Vec<(String, Value)>),
    Failed(String),
    Error { status: u16, body: String },
    /// The assistant posts a message to the thread; the run keeps going.
    Reply(String),
}

impl Step {
    pub fn tool(name: &str, arguments: Value) -> Self {
        Step::Tools(vec![(name.to_string(), arguments)])
    }
}

#[derive(Default)]
struct Inner {
    scripts: VecDeque<VecDeque<Step>>,
    active: VecDeque<Step>,
    runs: usize,
    threads: usize,
    calls: usize,
    /// `(thread id, role, text)` in posting order.
    messages: Vec<(String, String, String)>,
    outputs: Vec<(String, ToolOutput)>,
    deleted: Vec<String>,
    message_error: Option<(u16, String)>,
}

fn text_message(index: usize, role: &str, text: &str) -> Message {
    Message {
        id: format!("msg_{}", index + 1),
        role: role.to_string(),
        content: vec![MessageContent {
            kind: "text".to_string(),
            text: Some(MessageText {
                value: text.to_string(),
            }),
        }],
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    inner: Mutex<Inner>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the steps the next run will go through.
    pub fn push_run(&self, steps: Vec<Step>) {
        self.lock().scripts.push_back(steps.into());
    }

    /// User messages posted so far, as `(thread id, text)`.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.lock()
            .messages
            .iter()
            .filter(|(_, role, _)| role == "user")
            .map(|(thread, _, text)| (thread.clone(), text.clone()))
            .collect()
    }

    /// Makes the next `add_message` call fail with the given status.
    pub fn fail_next_message(&self, status: u16, body: &str) {
        self.lock().message_error = Some((status, body.to_string()));
    }

    /// Submitted tool outputs, as `(function name, output)`.
    pub fn outputs(&self) -> Vec<(String, ToolOutput)> {
        self.lock().outputs.clone()
    }

    pub fn deleted_assistants(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_step(&self, thread_id: &str, run_id: &str) -> Result<Run, ProviderError> {
        let mut inner = self.lock();
        let step = inner
            .active
            .pop_front()
            .unwrap_or(Step::Status(RunStatus::Completed));

        let mut run = Run {
            id: run_id.to_string(),
            thread_id: Some(thread_id.to_string()),
            status: RunStatus::InProgress,
            required_action: None,
            last_error: None,
        };

        match step {
            Step::Status(status) => run.status = status,
            Step::Failed(message) => {
                run.status = RunStatus::Failed;
                run.last_error = Some(RunError {
                    code: "server_error".to_string(),
                    message,
                });
            }
            Step::Error { status, body } => return Err(ProviderError::Status { status, body }),
            Step::Reply(text) => {
                inner
                    .messages
                    .push((thread_id.to_string(), "assistant".to_string(), text));
            }
            Step::Tools(calls) => {
                let tool_calls = calls
                    .into_iter()
                    .map(|(name, arguments)| {
                        inner.calls += 1;
                        RequestedToolCall {
                            id: format!("call_{}:{}", inner.calls, name),
                            kind: "function".to_string(),
                            function: FunctionCall {
                                name,
                                arguments: arguments.to_string(),
                            },
                        }
                    })
                    .collect();
                run.status = RunStatus::RequiresAction;
                run.required_action = Some(RequiredAction {
                    kind: "submit_tool_outputs".to_string(),
                    submit_tool_outputs: SubmitToolOutputs { tool_calls },
                });
            }
        }
        Ok(run)
    }
}

#[async_trait]
impl AssistantApi for ScriptedProvider {
    async fn create_assistant(
        &self,
        name: &str,
        _instructions: &str,
    ) -> Result<Assistant, ProviderError> {
        Ok(Assistant {
            id: "asst_scripted".to_string(),
            name: Some(name.to_string()),
        })
    }

    async fn create_thread(&self) -> Result<Thread, ProviderError> {
        let mut inner = self.lock();
        inner.threads += 1;
        Ok(Thread {
            id: format!("thread_{}", inner.threads),
        })
    }

    async fn add_message(&self, thread_id: &str, text: &str) -> Result<Message, ProviderError> {
        let mut inner = self.lock();
        if let Some((status, body)) = inner.message_error.take() {
            return Err(ProviderError::Status { status, body });
        }
        inner
            .messages
            .push((thread_id.to_string(), "user".to_string(), text.to_string()));
        Ok(text_message(inner.messages.len() - 1, "user", text))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ProviderError> {
        let inner = self.lock();
        Ok(inner
            .messages
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, (thread, _, _))| thread == thread_id)
            .map(|(i, (_, role, text))| text_message(i, role, text))
            .collect())
    }

    async fn run_assistant(
        &self,
        thread_id: &str,
        _assistant_id: &str,
    ) -> Result<Run, ProviderError> {
        let mut inner = self.lock();
        inner.runs += 1;
        inner.active = inner.scripts.pop_front().unwrap_or_default();
        Ok(Run {
            id: format!("run_{}", inner.runs),
            thread_id: Some(thread_id.to_string()),
            status: RunStatus::Queued,
            required_action: None,
            last_error: None,
        })
    }

    async fn get_run_status(&self, thread_id: &str, run_id: &str) -> Result<Run, ProviderError> {
        self.next_step(thread_id, run_id)
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ProviderError> {
        {
            let mut inner = self.lock();
            for output in outputs {
                let name = output
                    .tool_call_id
                    .split_once(':')
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_default();
                inner.outputs.push((name, output.clone()));
            }
        }
        self.next_step(thread_id, run_id)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<Deleted, ProviderError> {
        self.lock().deleted.push(assistant_id.to_string());
        Ok(Deleted {
            id: assistant_id.to_string(),
            deleted: true,
        })
    }
}
