//! Shared fixtures for the scenario tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use agentflow::{
    FixedTimeProvider, GenerateTextRequest, GenerateTextResponse, LlmError, LlmProvider,
    NewWorkflow, Node, RuntimeContext, SequentialIdGenerator, TokenUsage,
};

/// Provider that always answers with a fixed text and usage.
pub struct ScriptedProvider {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl ScriptedProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(text: impl Into<String>, total_tokens: i64) -> Self {
        Self {
            text: text.into(),
            usage: Some(TokenUsage {
                prompt_tokens: total_tokens / 2,
                completion_tokens: total_tokens - total_tokens / 2,
                total_tokens,
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate_text(
        &self,
        _request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, LlmError> {
        Ok(GenerateTextResponse {
            text: self.text.clone(),
            tool_calls: vec![],
            usage: self.usage,
        })
    }
}

/// Provider that invokes its first bridged tool before answering.
pub struct ToolCallingProvider;

#[async_trait]
impl LlmProvider for ToolCallingProvider {
    async fn generate_text(
        &self,
        request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, LlmError> {
        let tool = request
            .tools
            .first()
            .ok_or_else(|| LlmError::Provider("no tools offered".to_string()))?;
        let result = tool
            .invoke(Some("call-1".to_string()), serde_json::json!({ "q": "x" }))
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;
        Ok(GenerateTextResponse {
            text: format!("used {}: {}", tool.name, result),
            tool_calls: vec![],
            usage: Some(TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            }),
        })
    }
}

/// Deterministic clock and ids for scenario assertions.
pub fn deterministic_context() -> RuntimeContext {
    RuntimeContext::default()
        .with_time_provider(Arc::new(FixedTimeProvider::new(1_700_000_000_000)))
        .with_id_generator(Arc::new(SequentialIdGenerator::new("id")))
}

pub fn definition(value: Value) -> Node {
    serde_json::from_value(value).expect("valid node definition")
}

pub fn workflow(id: &str, def: Value) -> NewWorkflow {
    NewWorkflow {
        id: Some(id.to_string()),
        name: id.to_string(),
        version: "1".to_string(),
        definition: definition(def),
        typedefs: Default::default(),
        metadata: None,
    }
}
