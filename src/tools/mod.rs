//! Tool bridge: adapts caller-supplied tool definitions to the shape the
//! LLM provider invokes, synthesizing call ids and logging every invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::RuntimeContext;
use crate::model::ToolCallLog;
use crate::store::WorkflowStore;

/// Errors raised by tool execution. Recorded in the tool-call log and
/// returned to the provider, which may feed them back into the LLM loop.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
}

/// Caller-supplied behavior behind a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, input: Value, call: ToolCallContext) -> Result<Value, ToolError>;
}

/// Per-invocation context handed to a tool handler.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub tool_call_id: String,
}

/// Parameter schema for a tool: either a full JSON schema or a bare field
/// record that the bridge wraps into an object schema.
///
/// The field-record variant is tried first during deserialization; anything
/// that does not parse as one falls through to the raw schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolSchema {
    Fields(BTreeMap<String, FieldSpec>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl ToolSchema {
    /// Render as a JSON schema object for the provider.
    pub fn to_json_schema(&self) -> Value {
        match self {
            ToolSchema::Json(schema) => schema.clone(),
            ToolSchema::Fields(fields) => {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for (name, spec) in fields {
                    properties.insert(
                        name.clone(),
                        json!({ "type": spec.ty, "description": spec.description }),
                    );
                    required.push(Value::String(name.clone()));
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

/// A tool as supplied by the embedding application.
#[derive(Clone)]
pub struct ToolDefinition {
    pub description: String,
    pub schema: ToolSchema,
    pub handler: Arc<dyn ToolHandler>,
}

/// Registry of tools by name; LLM nodes reference entries via
/// `available_tools`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, definition: ToolDefinition) {
        self.tools.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }
}

/// A tool bound to one LLM execution, ready for the provider to invoke.
#[derive(Clone)]
pub struct BridgedTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    handler: Arc<dyn ToolHandler>,
    store: Arc<dyn WorkflowStore>,
    execution_id: String,
    context: RuntimeContext,
}

impl BridgedTool {
    pub fn new(
        name: impl Into<String>,
        definition: &ToolDefinition,
        store: Arc<dyn WorkflowStore>,
        execution_id: impl Into<String>,
        context: RuntimeContext,
    ) -> Self {
        Self {
            name: name.into(),
            description: definition.description.clone(),
            parameters: definition.schema.to_json_schema(),
            handler: Arc::clone(&definition.handler),
            store,
            execution_id: execution_id.into(),
            context,
        }
    }

    /// Run the underlying handler and log the invocation.
    ///
    /// A missing `tool_call_id` gets a synthesized one. Logging is
    /// best-effort and never masks the handler's result.
    pub async fn invoke(
        &self,
        tool_call_id: Option<String>,
        args: Value,
    ) -> Result<Value, ToolError> {
        let call_id = tool_call_id.unwrap_or_else(|| self.context.id_generator.next_id());
        let started_at = self.context.time_provider.now_ms();
        let result = self
            .handler
            .execute(
                args.clone(),
                ToolCallContext {
                    tool_call_id: call_id.clone(),
                },
            )
            .await;
        let finished_at = self.context.time_provider.now_ms();

        let log = ToolCallLog {
            id: self.context.id_generator.next_id(),
            execution_id: self.execution_id.clone(),
            tool_call_id: call_id,
            tool_name: self.name.clone(),
            args,
            result: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
            timestamp: started_at,
            duration_ms: Some(finished_at - started_at),
        };
        if let Err(e) = self.store.log_tool_call(log).await {
            tracing::warn!(tool = %self.name, error = %e, "tool call log write failed");
        }

        result
    }
}
