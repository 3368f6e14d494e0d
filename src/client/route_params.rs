// src/client/route_params.rs

use serde::{Deserialize, Serialize};
use url::Url;

use super::ClientError;

/// Assessment types whose questions are generated up front and handed to the
/// quiz page inline.
pub const SEEDED_TYPES: [&str; 2] = ["quiz", "code-snippet"];

/// A question passed to the quiz page in its `questions` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeededQuestion {
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Query parameters of the quiz page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteParams {
    pub assessment_id: String,
    /// Type slug used in API paths.
    pub assessment_type_id: String,
    pub assessment_name: Option<String>,
    /// Presentation kind (`quiz`, `code-snippet`, ...).
    pub kind: Option<String>,
    /// Time limit in seconds, if the page was given one.
    pub duration: Option<u64>,
    pub questions: Vec<SeededQuestion>,
}

impl RouteParams {
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let url = Url::parse(raw).map_err(|e| ClientError::InvalidRoute(e.to_string()))?;

        let mut params = RouteParams::default();
        let mut questions_raw = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "assessmentId" => params.assessment_id = value.into_owned(),
                "assessmentTypeId" => params.assessment_type_id = value.into_owned(),
                "assessmentName" => params.assessment_name = Some(value.into_owned()),
                "type" => params.kind = Some(value.into_owned()),
                "duration" => {
                    params.duration = Some(value.parse().map_err(|_| {
                        ClientError::InvalidRoute(format!("duration '{}' is not a number", value))
                    })?)
                }
                "questions" => questions_raw = Some(value.into_owned()),
                _ => {}
            }
        }

        if params.assessment_id.is_empty() {
            return Err(ClientError::InvalidRoute("missing assessmentId".to_string()));
        }
        if params.assessment_type_id.is_empty() {
            return Err(ClientError::InvalidRoute(
                "missing assessmentTypeId".to_string(),
            ));
        }

        if params.is_seeded() {
            let raw = questions_raw.ok_or_else(|| {
                ClientError::InvalidRoute("missing questions for seeded quiz".to_string())
            })?;
            params.questions = serde_json::from_str(&raw)
                .map_err(|e| ClientError::InvalidRoute(format!("questions: {}", e)))?;
        }

        Ok(params)
    }

    pub fn is_seeded(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| SEEDED_TYPES.contains(&kind))
    }
}
