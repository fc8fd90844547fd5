use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::dashboard::{tool_schemas, ToolDispatcher, ToolSchema};
use crate::data::{distinct_property_types, distinct_towns, SaleRecord};
use crate::llm_client::{ChatTurn, LlmReply, SharedLlmClient};

use super::traits::{AssistantBehavior, AssistantRequest, AssistantResponse};

/// Hard cap on tool rounds per user turn. The loop always terminates: either
/// the model answers with text, or the cap trips and a designated limit
/// message is returned.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Context block describing the loaded dataset, rebuilt once at startup and
/// embedded in every system prompt.
#[derive(Debug, Clone)]
pub struct DataSummary {
    pub record_count: usize,
    pub towns: Vec<String>,
    pub property_types: Vec<String>,
}

impl DataSummary {
    pub fn from_records(records: &[SaleRecord]) -> Self {
        Self {
            record_count: records.len(),
            towns: distinct_towns(records),
            property_types: distinct_property_types(records),
        }
    }

    fn context_block(&self) -> String {
        format!(
            "The dataset contains {count} real estate sales records. Key fields include: town, \
             list_year, assessed_value, sale_amount, property_type, residential_type. Available \
             towns are: {towns}. Available property types are: {types}.",
            count = self.record_count,
            towns = self.towns.join(", "),
            types = self.property_types.join(", "),
        )
    }
}

/// Chat front end of the dashboard: relays user turns to the model with the
/// tool menu attached and dispatches at most one tool request per round.
/// Completed exchanges are kept as context for later turns; intra-turn tool
/// traffic is not.
pub struct DashboardAssistant {
    llm: SharedLlmClient,
    dispatcher: Arc<ToolDispatcher>,
    schemas: Vec<ToolSchema>,
    summary: DataSummary,
    history: tokio::sync::Mutex<Vec<ChatTurn>>,
}

impl DashboardAssistant {
    pub fn new(llm: SharedLlmClient, dispatcher: Arc<ToolDispatcher>, summary: DataSummary) -> Self {
        Self {
            llm,
            dispatcher,
            schemas: tool_schemas(),
            summary,
            history: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    async fn remember_exchange(&self, input: &str, output: &str) {
        let mut history = self.history.lock().await;
        history.push(ChatTurn::User(input.to_string()));
        history.push(ChatTurn::Assistant(output.to_string()));
    }

    fn system_directive(&self) -> String {
        format!(
            "You are an AI assistant for a real estate data dashboard. {context} You can answer \
             questions about the data and control the dashboard. When asked to perform an action \
             like resizing a chart, filtering data, changing a displayed field, or calculating \
             metrics, use the provided tools. For general conversation or data questions that do \
             not require specific calculations, reply with a helpful text response.",
            context = self.summary.context_block(),
        )
    }
}

#[async_trait]
impl AssistantBehavior for DashboardAssistant {
    #[instrument(skip_all, fields(input = %request.input))]
    async fn handle(&self, request: AssistantRequest) -> anyhow::Result<AssistantResponse> {
        let system = self.system_directive();
        let mut turns = self.history.lock().await.clone();
        turns.push(ChatTurn::User(request.input.clone()));

        for round in 0..MAX_TOOL_ROUNDS {
            let reply = self.llm.chat(&system, &turns, &self.schemas).await?;

            match reply {
                LlmReply::Text(text) => {
                    self.remember_exchange(&request.input, &text).await;
                    return Ok(AssistantResponse::with_metadata(
                        text,
                        json!({ "tool_rounds": round }),
                    ));
                }
                LlmReply::ToolCall {
                    id,
                    name,
                    arguments,
                } => {
                    info!(round, tool = %name, "Assistant requested a tool");
                    let args: Value = serde_json::from_str(&arguments).unwrap_or_else(|err| {
                        debug!(?err, "Tool arguments were not valid JSON");
                        Value::Null
                    });

                    // The dispatcher applies state changes before returning,
                    // so the next round aggregates against post-update state.
                    let result = self.dispatcher.dispatch(&name, &args).await;
                    turns.push(ChatTurn::ToolCall {
                        id: id.clone(),
                        name,
                        arguments,
                    });
                    turns.push(ChatTurn::ToolResult {
                        id,
                        content: result,
                    });
                }
            }
        }

        warn!(limit = MAX_TOOL_ROUNDS, "Tool-call limit reached");
        let message = format!(
            "I reached the tool-call limit ({MAX_TOOL_ROUNDS} rounds) without a final answer. \
             Every action above was applied to the dashboard; ask a follow-up to continue."
        );
        self.remember_exchange(&request.input, &message).await;
        Ok(AssistantResponse::with_metadata(
            message,
            json!({ "tool_rounds": MAX_TOOL_ROUNDS, "limit_reached": true }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{ChartName, ChartSize};
    use crate::data::mock::sample_records;
    use crate::llm_client::ScriptedLlmClient;

    fn assistant_with(replies: Vec<LlmReply>) -> (DashboardAssistant, Arc<ToolDispatcher>) {
        let records = Arc::new(sample_records());
        let dispatcher = Arc::new(ToolDispatcher::new(records.clone()));
        let summary = DataSummary::from_records(&records);
        let assistant =
            DashboardAssistant::new(ScriptedLlmClient::shared(replies), dispatcher.clone(), summary);
        (assistant, dispatcher)
    }

    fn tool_call(name: &str, arguments: &str) -> LlmReply {
        LlmReply::ToolCall {
            id: format!("call-{name}"),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn plain_text_replies_pass_straight_through() {
        let (assistant, _) = assistant_with(vec![LlmReply::Text(
            "Median prices vary quite a bit by town.".to_string(),
        )]);

        let response = assistant
            .handle(AssistantRequest::new("tell me about prices"))
            .await
            .expect("assistant turn");
        assert_eq!(response.output, "Median prices vary quite a bit by town.");
        assert_eq!(response.metadata.unwrap()["tool_rounds"], 0);
    }

    #[tokio::test]
    async fn a_tool_round_mutates_state_before_the_final_text() {
        let (assistant, dispatcher) = assistant_with(vec![
            tool_call("resizeChart", r#"{"chartName":"bar","size":"full"}"#),
            LlmReply::Text("Done - the bar chart now spans the full width.".to_string()),
        ]);

        let response = assistant
            .handle(AssistantRequest::new("make the bar chart bigger"))
            .await
            .expect("assistant turn");
        assert!(response.output.contains("full"));
        assert_eq!(response.metadata.unwrap()["tool_rounds"], 1);

        let state = dispatcher.state();
        assert_eq!(
            state.lock().await.chart(ChartName::Bar).size,
            ChartSize::Full
        );
    }

    #[tokio::test]
    async fn the_iteration_cap_returns_the_designated_limit_message() {
        let replies = (0..MAX_TOOL_ROUNDS)
            .map(|_| tool_call("calculateAggregate", r#"{"field":"sale_amount","operation":"count"}"#))
            .collect();
        let (assistant, _) = assistant_with(replies);

        let response = assistant
            .handle(AssistantRequest::new("count everything forever"))
            .await
            .expect("assistant turn");
        assert!(response.output.contains("tool-call limit"));
        assert_eq!(response.metadata.unwrap()["limit_reached"], true);
    }

    #[tokio::test]
    async fn malformed_tool_arguments_surface_as_dispatcher_error_text() {
        let (assistant, _) = assistant_with(vec![
            tool_call("resizeChart", "definitely not json"),
            LlmReply::Text("Sorry, that resize did not work.".to_string()),
        ]);

        // The dispatcher's error string is relayed back to the model rather
        // than failing the turn.
        let response = assistant
            .handle(AssistantRequest::new("resize"))
            .await
            .expect("assistant turn");
        assert!(response.output.contains("did not work"));
    }

    /// Records the transcript handed to each chat call so tests can check
    /// what context the model actually sees.
    #[derive(Default)]
    struct RecordingLlmClient {
        calls: std::sync::Mutex<Vec<Vec<ChatTurn>>>,
    }

    #[async_trait]
    impl crate::llm_client::LlmClient for RecordingLlmClient {
        async fn chat(
            &self,
            _system: &str,
            turns: &[ChatTurn],
            _tools: &[ToolSchema],
        ) -> anyhow::Result<LlmReply> {
            let mut calls = self.calls.lock().expect("lock poisoned");
            calls.push(turns.to_vec());
            Ok(LlmReply::Text(format!("reply {}", calls.len())))
        }
    }

    #[tokio::test]
    async fn completed_exchanges_become_context_for_the_next_turn() {
        let client = Arc::new(RecordingLlmClient::default());
        let records = Arc::new(sample_records());
        let dispatcher = Arc::new(ToolDispatcher::new(records.clone()));
        let assistant = DashboardAssistant::new(
            client.clone(),
            dispatcher,
            DataSummary::from_records(&records),
        );

        assistant
            .handle(AssistantRequest::new("first question"))
            .await
            .expect("first turn");
        assistant
            .handle(AssistantRequest::new("second question"))
            .await
            .expect("second turn");

        let calls = client.calls.lock().expect("lock poisoned");
        assert_eq!(calls[0].len(), 1);
        assert_eq!(calls[1].len(), 3);
        assert!(matches!(calls[1][1], ChatTurn::Assistant(_)));
        assert_eq!(calls[1][2], ChatTurn::User("second question".to_string()));
    }

    #[tokio::test]
    async fn llm_failure_after_retries_is_an_error_for_this_turn_only() {
        let (assistant, dispatcher) = assistant_with(Vec::new());

        assert!(assistant
            .handle(AssistantRequest::new("hello"))
            .await
            .is_err());

        // Dashboard state is untouched by the failed turn.
        let state = dispatcher.state();
        assert!(state.lock().await.filters.is_unrestricted());
    }
}
