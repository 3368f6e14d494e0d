// src/orchestrator/assistant.rs

use super::ASSISTANT_INSTRUCTIONS;
use crate::provider::{AssistantApi, ProviderError};

pub const ASSISTANT_NAME: &str = "Quizbot";

/// The assistant this process runs assessments with.
///
/// A configured assistant is only borrowed. One created at startup is owned and
/// deleted again by [`release`](Self::release).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantLease {
    pub id: String,
    owned: bool,
}

impl AssistantLease {
    pub async fn acquire(
        provider: &dyn AssistantApi,
        configured: Option<&str>,
    ) -> Result<Self, ProviderError> {
        if let Some(id) = configured {
            tracing::info!("Using configured assistant {}", id);
            return Ok(Self {
                id: id.to_string(),
                owned: false,
            });
        }

        let assistant = provider
            .create_assistant(ASSISTANT_NAME, ASSISTANT_INSTRUCTIONS)
            .await?;
        tracing::info!("Created assistant {}", assistant.id);
        Ok(Self {
            id: assistant.id,
            owned: true,
        })
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Deletes the assistant if this process created it.
    pub async fn release(self, provider: &dyn AssistantApi) -> Result<(), ProviderError> {
        if !self.owned {
            return Ok(());
        }
        let deleted = provider.delete_assistant(&self.id).await?;
        if deleted.deleted {
            tracing::info!("Deleted assistant {}", self.id);
        } else {
            tracing::warn!("Assistant {} was not deleted", self.id);
        }
        Ok(())
    }
}
