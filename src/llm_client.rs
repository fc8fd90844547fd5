use std::collections::VecDeque;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObjectArgs,
};
use async_openai::{config::OpenAIConfig, Client as AsyncOpenAiClient};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::dashboard::ToolSchema;

pub type SharedLlmClient = Arc<dyn LlmClient>;

/// One entry in the running transcript of the current turn's tool cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurn {
    User(String),
    Assistant(String),
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    ToolResult {
        id: String,
        content: String,
    },
}

/// What the model came back with: plain text, or exactly one tool request.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        system: &str,
        turns: &[ChatTurn],
        tools: &[ToolSchema],
    ) -> anyhow::Result<LlmReply>;
}

/// Scripted stand-in: hands back queued replies in order. Used by tests and
/// by offline runs where no model endpoint is configured.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<LlmReply>>,
}

impl ScriptedLlmClient {
    pub fn with_replies(replies: impl IntoIterator<Item = LlmReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    pub fn shared(replies: impl IntoIterator<Item = LlmReply>) -> SharedLlmClient {
        Arc::new(Self::with_replies(replies))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn chat(
        &self,
        _system: &str,
        _turns: &[ChatTurn],
        _tools: &[ToolSchema],
    ) -> anyhow::Result<LlmReply> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted client lock poisoned"))?;
        replies
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted client has no replies left"))
    }
}

/// OpenAI-compatible client that can point at OpenAI, vLLM, or any
/// HTTP-compatible backend exposing chat completions with tool calling.
pub struct OpenAiLlmClient {
    client: AsyncOpenAiClient<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl OpenAiLlmClient {
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    const MODEL_VARS: [&'static str; 2] = ["ESTATE_DECK_LLM_MODEL", "OPENAI_MODEL"];
    const RETRY_VARS: [&'static str; 1] = ["ESTATE_DECK_LLM_RETRIES"];

    pub fn shared_from_env() -> anyhow::Result<SharedLlmClient> {
        let client = Self::from_env()?;
        Ok(Arc::new(client))
    }

    fn from_env() -> anyhow::Result<Self> {
        let config = Self::build_config_from_env()?;
        let model =
            Self::read_env(&Self::MODEL_VARS).unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        let max_retries = Self::read_env(&Self::RETRY_VARS)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);

        Ok(Self {
            client: AsyncOpenAiClient::with_config(config),
            model,
            max_retries,
        })
    }

    fn build_config_from_env() -> anyhow::Result<OpenAIConfig> {
        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("ESTATE_DECK_OPENAI_API_KEY"))
            .context(
                "Set OPENAI_API_KEY (or ESTATE_DECK_OPENAI_API_KEY) to use the OpenAI client",
            )?;

        let mut config = OpenAIConfig::new().with_api_key(api_key);

        if let Ok(base_url) =
            env::var("OPENAI_BASE_URL").or_else(|_| env::var("ESTATE_DECK_OPENAI_BASE_URL"))
        {
            config = config.with_api_base(base_url);
        }

        Ok(config)
    }

    fn read_env(candidates: &[&'static str]) -> Option<String> {
        candidates.iter().find_map(|key| env::var(key).ok())
    }

    fn build_messages(
        system: &str,
        turns: &[ChatTurn],
    ) -> anyhow::Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(turns.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
        );

        for turn in turns {
            let message: ChatCompletionRequestMessage = match turn {
                ChatTurn::User(text) => ChatCompletionRequestUserMessageArgs::default()
                    .content(text.as_str())
                    .build()?
                    .into(),
                ChatTurn::Assistant(text) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(text.as_str())
                    .build()?
                    .into(),
                ChatTurn::ToolCall {
                    id,
                    name,
                    arguments,
                } => ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(vec![ChatCompletionMessageToolCall {
                        id: id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: arguments.clone(),
                        },
                    }])
                    .build()?
                    .into(),
                ChatTurn::ToolResult { id, content } => {
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(content.as_str())
                        .tool_call_id(id.clone())
                        .build()?
                        .into()
                }
            };
            messages.push(message);
        }

        Ok(messages)
    }

    #[instrument(level = "debug", skip_all)]
    async fn chat_once(
        &self,
        system: &str,
        turns: &[ChatTurn],
        tools: &[ToolSchema],
    ) -> anyhow::Result<LlmReply> {
        let messages = Self::build_messages(system, turns)?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .temperature(0.2)
            .messages(messages);

        if !tools.is_empty() {
            let declarations = tools
                .iter()
                .map(|tool| {
                    Ok(ChatCompletionToolArgs::default()
                        .function(
                            FunctionObjectArgs::default()
                                .name(tool.name)
                                .description(tool.description)
                                .parameters(tool.parameters.clone())
                                .build()?,
                        )
                        .build()?)
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            request.tools(declarations);
        }

        let response = self.client.chat().create(request.build()?).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("LLM response did not contain any choices")?;

        if let Some(mut calls) = choice.message.tool_calls {
            if calls.len() > 1 {
                debug!(
                    extra = calls.len() - 1,
                    "Model requested multiple tools; only the first is honored"
                );
            }
            if !calls.is_empty() {
                let call = calls.remove(0);
                return Ok(LlmReply::ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                });
            }
        }

        let text = choice
            .message
            .content
            .unwrap_or_else(|| String::from("[empty LLM response]"));
        Ok(LlmReply::Text(text))
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    /// Retries transport failures with capped exponential backoff (1s, 2s,
    /// 4s); after the final attempt the error is terminal for this turn only.
    async fn chat(
        &self,
        system: &str,
        turns: &[ChatTurn],
        tools: &[ToolSchema],
    ) -> anyhow::Result<LlmReply> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match self.chat_once(system, turns, tools).await {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    warn!(attempt, ?err, "LLM request failed");
                    last_error = Some(err);
                    if attempt < self.max_retries - 1 {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("LLM request never attempted")))
    }
}

/// Attempt to build an OpenAI-compatible client, optionally falling back to a
/// scripted offline client when no endpoint is configured.
pub fn build_llm_client_from_env(default_to_scripted: bool) -> anyhow::Result<SharedLlmClient> {
    match OpenAiLlmClient::shared_from_env() {
        Ok(client) => Ok(client),
        Err(err) if default_to_scripted => {
            warn!(?err, "Falling back to the scripted offline client");
            Ok(ScriptedLlmClient::shared([LlmReply::Text(
                "The assistant is offline: no model endpoint is configured. Set OPENAI_API_KEY \
                 to enable chat."
                    .to_string(),
            )]))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_replays_in_order_then_runs_dry() {
        let client = ScriptedLlmClient::with_replies([
            LlmReply::Text("first".to_string()),
            LlmReply::ToolCall {
                id: "call-1".to_string(),
                name: "resizeChart".to_string(),
                arguments: "{}".to_string(),
            },
        ]);

        let first = client.chat("system", &[], &[]).await.expect("first reply");
        assert_eq!(first, LlmReply::Text("first".to_string()));

        let second = client.chat("system", &[], &[]).await.expect("second reply");
        assert!(matches!(second, LlmReply::ToolCall { ref name, .. } if name == "resizeChart"));

        assert!(client.chat("system", &[], &[]).await.is_err());
    }

    #[test]
    fn transcript_turns_map_to_request_messages() {
        let turns = vec![
            ChatTurn::User("resize the bar chart".to_string()),
            ChatTurn::ToolCall {
                id: "call-1".to_string(),
                name: "resizeChart".to_string(),
                arguments: r#"{"chartName":"bar","size":"large"}"#.to_string(),
            },
            ChatTurn::ToolResult {
                id: "call-1".to_string(),
                content: "Resized the bar chart to large.".to_string(),
            },
        ];

        let messages = OpenAiLlmClient::build_messages("you are a dashboard assistant", &turns)
            .expect("build messages");
        // System prompt plus one message per turn.
        assert_eq!(messages.len(), 4);
    }
}
