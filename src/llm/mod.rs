//! LLM provider contract and the single-call executor.

mod error;
mod executor;
mod provider;
mod types;

pub use error::LlmError;
pub use executor::{LlmCall, LlmCallOutcome, LlmExecutor};
pub use provider::LlmProvider;
pub use types::{input_to_prompt, GenerateTextRequest, GenerateTextResponse};
