use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured payload for one user turn entering the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub input: String,
}

impl AssistantRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Standardized response wrapper so callers can rely on metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub output: String,
    pub metadata: Option<serde_json::Value>,
}

impl AssistantResponse {
    #[allow(dead_code)]
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(output: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            output: output.into(),
            metadata: Some(metadata),
        }
    }
}

#[async_trait]
pub trait AssistantBehavior: Send + Sync {
    async fn handle(&self, request: AssistantRequest) -> anyhow::Result<AssistantResponse>;
}
