use std::sync::Arc;

use serde_json::Value;

use super::provider::LlmProvider;
use super::types::{input_to_prompt, GenerateTextRequest};
use crate::core::RuntimeContext;
use crate::model::{LlmExecutionRecord, TokenUsage, ToolInvocation};
use crate::store::{StoreError, WorkflowStore};
use crate::tools::{BridgedTool, ToolDefinition};

/// Parameters for one LLM node invocation.
pub struct LlmCall {
    pub model: String,
    pub system_prompt: Option<String>,
    /// Tools resolved from the registry, by name.
    pub tools: Vec<(String, ToolDefinition)>,
    pub max_retries: u32,
    pub session_id: String,
    /// Qualified id of the calling node.
    pub node_id: String,
}

/// Result of one LLM invocation. Provider failures come back as
/// `success == false` rather than as an error; only store failures raise.
#[derive(Debug, Clone)]
pub struct LlmCallOutcome {
    pub execution_id: String,
    pub success: bool,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
}

/// Executes single LLM calls: prompt serialization, tool bridging, provider
/// invocation, and the durable execution record.
pub struct LlmExecutor {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn WorkflowStore>,
    context: RuntimeContext,
}

impl LlmExecutor {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn WorkflowStore>,
        context: RuntimeContext,
    ) -> Self {
        Self {
            provider,
            store,
            context,
        }
    }

    pub async fn execute(&self, input: &Value, call: LlmCall) -> Result<LlmCallOutcome, StoreError> {
        let execution_id = self.context.id_generator.next_id();
        let prompt = input_to_prompt(input);

        let tools: Vec<BridgedTool> = call
            .tools
            .iter()
            .map(|(name, definition)| {
                BridgedTool::new(
                    name,
                    definition,
                    Arc::clone(&self.store),
                    &execution_id,
                    self.context.clone(),
                )
            })
            .collect();

        let request = GenerateTextRequest {
            model: call.model,
            system: call.system_prompt,
            prompt,
            tools,
            max_retries: call.max_retries,
            temperature: None,
            max_tokens: None,
        };

        let response = self.provider.generate_text(request).await;
        let timestamp = self.context.time_provider.now_ms();

        let outcome = match response {
            Ok(response) => LlmCallOutcome {
                execution_id: execution_id.clone(),
                success: true,
                text: Some(response.text),
                tool_calls: response.tool_calls,
                usage: response.usage,
                error: None,
            },
            Err(e) => LlmCallOutcome {
                execution_id: execution_id.clone(),
                success: false,
                text: None,
                tool_calls: vec![],
                usage: None,
                error: Some(e.to_string()),
            },
        };

        self.store
            .save_llm_execution(LlmExecutionRecord {
                id: execution_id,
                session_id: call.session_id,
                node_id: call.node_id,
                timestamp,
                success: outcome.success,
                text: outcome.text.clone(),
                tool_calls: outcome.tool_calls.clone(),
                usage: outcome.usage,
                error: outcome.error.clone(),
                metadata: None,
            })
            .await?;

        Ok(outcome)
    }
}
