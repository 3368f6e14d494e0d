// src/client/api.rs

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ClientError;
use crate::models::{
    assessment::{
        AnswerOutcome, StartAssessmentRequest, StartAssessmentResponse, StatusResponse,
        SubmitAnswerRequest,
    },
    question::PublicQuestion,
    quiz::{CompleteResponse, QuizModel},
};

/// Typed wrapper around the `/api/assessments` routes.
#[derive(Debug, Clone)]
pub struct QuizApiClient {
    http: Client,
    base_url: String,
}

impl QuizApiClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, assessment_type: &str, assessment_id: &str, tail: &str) -> String {
        format!(
            "{}/api/assessments/{}/{}{}",
            self.base_url, assessment_type, assessment_id, tail
        )
    }

    /// Turns non-2xx responses into `ClientError::Status`, using the
    /// server's `{"error": ...}` message when there is one.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn start(
        &self,
        assessment_type: &str,
        req: &StartAssessmentRequest,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/assessments/{}", self.base_url, assessment_type))
            .json(req)
            .send()
            .await?;
        let started: StartAssessmentResponse = Self::decode(response).await?;
        Ok(started.assessment_id)
    }

    pub async fn next_question(
        &self,
        assessment_type: &str,
        assessment_id: &str,
    ) -> Result<PublicQuestion, ClientError> {
        let response = self
            .http
            .post(self.url(assessment_type, assessment_id, "/questions"))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn submit_answer(
        &self,
        assessment_type: &str,
        assessment_id: &str,
        req: &SubmitAnswerRequest,
    ) -> Result<AnswerOutcome, ClientError> {
        let response = self
            .http
            .post(self.url(assessment_type, assessment_id, "/answers"))
            .json(req)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn complete(
        &self,
        assessment_type: &str,
        assessment_id: &str,
    ) -> Result<QuizModel, ClientError> {
        let response = self
            .http
            .post(self.url(assessment_type, assessment_id, "/complete"))
            .send()
            .await?;
        let completed: CompleteResponse = Self::decode(response).await?;
        Ok(completed.quiz)
    }

    pub async fn status(
        &self,
        assessment_type: &str,
        assessment_id: &str,
    ) -> Result<StatusResponse, ClientError> {
        let response = self
            .http
            .get(self.url(assessment_type, assessment_id, "/status"))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn summary(
        &self,
        assessment_type: &str,
        assessment_id: &str,
    ) -> Result<QuizModel, ClientError> {
        let response = self
            .http
            .get(self.url(assessment_type, assessment_id, ""))
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_built_without_double_slashes() {
        let client = QuizApiClient::new(Client::new(), "http://localhost:3000/");
        assert_eq!(
            client.url("quiz", "a1", "/status"),
            "http://localhost:3000/api/assessments/quiz/a1/status"
        );
        assert_eq!(
            client.url("quiz", "a1", ""),
            "http://localhost:3000/api/assessments/quiz/a1"
        );
    }
}
