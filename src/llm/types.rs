use serde_json::Value;

use crate::model::{TokenUsage, ToolInvocation};
use crate::tools::BridgedTool;

/// Request for one text generation.
///
/// The provider owns the tool-call/response loop: it invokes the bridged
/// tools as the model asks for them and returns the final text plus the
/// aggregated tool-call list.
pub struct GenerateTextRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub tools: Vec<BridgedTool>,
    pub max_retries: u32,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Final result of one text generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateTextResponse {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Option<TokenUsage>,
}

impl GenerateTextResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Helper for building prompt text out of a node input: strings pass
/// through, anything else is rendered as compact JSON.
pub fn input_to_prompt(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_to_prompt_string_passthrough() {
        assert_eq!(input_to_prompt(&json!("ask me")), "ask me");
    }

    #[test]
    fn test_input_to_prompt_json_rendering() {
        assert_eq!(input_to_prompt(&json!({ "a": 1 })), r#"{"a":1}"#);
        assert_eq!(input_to_prompt(&json!(null)), "null");
    }
}
