// src/provider/openai.rs

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    Assistant, AssistantApi, Deleted, ListResponse, Message, ProviderError, Run, Thread,
    ToolOutput, tools::assistant_tools,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// reqwest-backed client for the assistants API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(client: Client, base_url: &str, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v1")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProviderError> {
        let res = req.send().await?;
        decode(res).await
    }
}

/// Maps non-2xx responses to `ProviderError::Status`, everything else into `T`.
async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ProviderError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        tracing::warn!("Provider responded {}: {}", status, body);
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = res.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_assistant(
        &self,
        name: &str,
        instructions: &str,
    ) -> Result<Assistant, ProviderError> {
        let req = self.request(Method::POST, "/assistants").json(&json!({
            "model": self.model,
            "name": name,
            "instructions": instructions,
            "tools": assistant_tools(),
        }));
        self.send(req).await
    }

    async fn create_thread(&self) -> Result<Thread, ProviderError> {
        self.send(self.request(Method::POST, "/threads")).await
    }

    async fn add_message(&self, thread_id: &str, text: &str) -> Result<Message, ProviderError> {
        let req = self
            .request(Method::POST, &format!("/threads/{}/messages", thread_id))
            .json(&json!({ "role": "user", "content": text }));
        self.send(req).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, ProviderError> {
        let req = self.request(Method::GET, &format!("/threads/{}/messages", thread_id));
        let list: ListResponse<Message> = self.send(req).await?;
        Ok(list.data)
    }

    async fn run_assistant(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<Run, ProviderError> {
        let req = self
            .request(Method::POST, &format!("/threads/{}/runs", thread_id))
            .json(&json!({ "assistant_id": assistant_id }));
        self.send(req).await
    }

    async fn get_run_status(&self, thread_id: &str, run_id: &str) -> Result<Run, ProviderError> {
        let req = self.request(
            Method::GET,
            &format!("/threads/{}/runs/{}", thread_id, run_id),
        );
        self.send(req).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ProviderError> {
        let req = self
            .request(
                Method::POST,
                &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            )
            .json(&json!({ "tool_outputs": outputs }));
        self.send(req).await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<Deleted, ProviderError> {
        let req = self.request(Method::DELETE, &format!("/assistants/{}", assistant_id));
        self.send(req).await
    }
}
