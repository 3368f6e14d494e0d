// src/provider/tools.rs

//! Function tools the assistant may call, and their typed arguments.

use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use super::FunctionCall;
use crate::models::{assessment::Difficulty, question::MAX_OPTIONS};

/// Tool schema registered with the assistant on creation.
pub fn assistant_tools() -> Value {
    json!([
        { "type": "retrieval" },
        {
            "type": "function",
            "function": {
                "name": "generateQuestions",
                "description": "Create a new problem based on the user's skill and performance. \
                    The question is attached to the user's assessment. Returns true on success, \
                    false otherwise; on false call the function again with corrected arguments. \
                    On true complete the run without additional messages.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "content": { "type": "string", "description": "The question itself." },
                        "options": {
                            "type": "array",
                            "description": "Answer options when assessmentTypeName is \"quiz\" or \"multiple_choice\".",
                            "items": { "type": "string" },
                            "maxItems": MAX_OPTIONS
                        },
                        "correctAnswer": {
                            "type": "string",
                            "description": "An outline of the correct answer."
                        }
                    },
                    "required": ["content", "correctAnswer"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "handleUserInput",
                "description": "Judge the user's answer to the current question, explain it, \
                    then call adjustDifficulty. Returns true on success, false otherwise; on \
                    false call the function again with corrected arguments.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "userAnswer": { "type": "string", "description": "User's answer." },
                        "isCorrect": { "type": "boolean", "description": "Whether the answer is correct." },
                        "explanation": { "type": "string", "description": "Why the correct answer is correct." }
                    },
                    "required": ["userAnswer", "isCorrect", "explanation"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "adjustDifficulty",
                "description": "Change the complexity of upcoming questions. Returns true on \
                    success, false otherwise; on false call the function again.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "adjustedDifficulty": {
                            "type": "string",
                            "enum": ["beginner", "intermediate", "advanced"]
                        }
                    },
                    "required": ["adjustedDifficulty"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "feedback",
                "description": "Call retrieveAssessment first, then give the user feedback on \
                    their performance. Stores the feedback and marks the assessment completed. \
                    Returns true on success, false otherwise.",
                "parameters": {
                    "type": "object",
                    "properties": { "feedback": { "type": "string" } },
                    "required": ["feedback"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "retrieveAssessment",
                "description": "Fetch the user's assessment as a JSON object.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "assessmentId": { "type": "string", "minLength": 8 }
                    },
                    "required": ["assessmentId"]
                }
            }
        }
    ])
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsArgs {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 4))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 4000))]
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HandleUserInputArgs {
    #[serde(default)]
    pub user_answer: Option<String>,
    pub is_correct: bool,
    #[validate(length(min = 1, max = 8000))]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustDifficultyArgs {
    pub adjusted_difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackArgs {
    #[validate(length(min = 1, max = 8000))]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAssessmentArgs {
    #[serde(default)]
    pub assessment_id: Option<String>,
}

/// A decoded tool call requested by the assistant.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    GenerateQuestions(GenerateQuestionsArgs),
    HandleUserInput(HandleUserInputArgs),
    AdjustDifficulty(AdjustDifficultyArgs),
    Feedback(FeedbackArgs),
    RetrieveAssessment(RetrieveAssessmentArgs),
}

/// Why a requested call could not be decoded. Answered with `false` so the assistant retries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolCallError {
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("invalid arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GenerateQuestions(_) => "generateQuestions",
            ToolCall::HandleUserInput(_) => "handleUserInput",
            ToolCall::AdjustDifficulty(_) => "adjustDifficulty",
            ToolCall::Feedback(_) => "feedback",
            ToolCall::RetrieveAssessment(_) => "retrieveAssessment",
        }
    }
}

impl TryFrom<&FunctionCall> for ToolCall {
    type Error = ToolCallError;

    fn try_from(call: &FunctionCall) -> Result<Self, Self::Error> {
        let name = call.name.as_str();
        match name {
            "generateQuestions" => parse(name, &call.arguments).map(ToolCall::GenerateQuestions),
            "handleUserInput" => parse(name, &call.arguments).map(ToolCall::HandleUserInput),
            "adjustDifficulty" => parse(name, &call.arguments).map(ToolCall::AdjustDifficulty),
            "feedback" => parse(name, &call.arguments).map(ToolCall::Feedback),
            "retrieveAssessment" => parse(name, &call.arguments).map(ToolCall::RetrieveAssessment),
            other => Err(ToolCallError::UnknownFunction(other.to_string())),
        }
    }
}

fn parse<T>(name: &str, arguments: &str) -> Result<T, ToolCallError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let invalid = |reason: String| ToolCallError::InvalidArguments {
        name: name.to_string(),
        reason,
    };

    // Some models send an empty string for argument-less calls.
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    let args: T = serde_json::from_str(arguments).map_err(|e| invalid(e.to_string()))?;
    args.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_decodes_generate_questions() {
        let parsed = ToolCall::try_from(&call(
            "generateQuestions",
            r#"{"content":"2+2?","options":["3","4"],"correctAnswer":"4"}"#,
        ))
        .unwrap();
        assert_eq!(
            parsed,
            ToolCall::GenerateQuestions(GenerateQuestionsArgs {
                content: "2+2?".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                correct_answer: "4".to_string(),
            })
        );
    }

    #[test]
    fn test_rejects_too_many_options() {
        let err = ToolCall::try_from(&call(
            "generateQuestions",
            r#"{"content":"?","options":["a","b","c","d","e"],"correctAnswer":"a"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidArguments { .. }));
    }

    #[test]
    fn test_rejects_unknown_difficulty() {
        let err = ToolCall::try_from(&call(
            "adjustDifficulty",
            r#"{"adjustedDifficulty":"expert"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidArguments { .. }));
    }

    #[test]
    fn test_unknown_function() {
        let err = ToolCall::try_from(&call("deleteEverything", "{}")).unwrap_err();
        assert_eq!(
            err,
            ToolCallError::UnknownFunction("deleteEverything".to_string())
        );
    }

    #[test]
    fn test_empty_arguments_for_retrieve() {
        let parsed = ToolCall::try_from(&call("retrieveAssessment", "")).unwrap();
        assert_eq!(parsed.name(), "retrieveAssessment");
    }

    #[test]
    fn test_schema_lists_every_function() {
        let tools = assistant_tools();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["function"]["name"].as_str())
            .collect();
        assert_eq!(
            names,
            [
                "generateQuestions",
                "handleUserInput",
                "adjustDifficulty",
                "feedback",
                "retrieveAssessment"
            ]
        );
    }
}
