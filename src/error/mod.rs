//! Layered error types: [`NodeError`] for failures inside a single node,
//! [`EngineError`] for run-level outcomes (including the `Suspended`
//! control-flow signal). Subsystem errors (`TransformError`, `BudgetError`,
//! `StoreError`, `LlmError`, `ToolError`) live with their modules and convert
//! upward at the seams.

mod engine_error;
mod node_error;

pub use engine_error::EngineError;
pub use node_error::NodeError;
