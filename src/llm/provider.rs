use async_trait::async_trait;

use super::error::LlmError;
use super::types::{GenerateTextRequest, GenerateTextResponse};

/// The text-generation provider consumed by the core.
///
/// Implementations are expected to run the tool-call loop internally,
/// invoking [`crate::tools::BridgedTool::invoke`] for each call the model
/// makes, and to report token usage when the backend exposes it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(
        &self,
        request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, LlmError>;
}
