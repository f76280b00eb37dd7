use thiserror::Error;

use crate::budget::BudgetError;
use crate::transform::TransformError;

/// Node-level errors. A node error fails the node that raised it and, from
/// there, the enclosing session.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Cycle detected at node '{node_id}'")]
    CycleDetected { node_id: String },
    #[error("Dangling node '{node_id}': no outgoing edge before the exit point")]
    DanglingNode { node_id: String },
    #[error("Node kind '{0}' is not implemented")]
    Unimplemented(&'static str),
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("LLM call failed: {0}")]
    LlmFailed(String),
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
    #[error("Budget error: {0}")]
    Budget(#[from] BudgetError),
    #[error("Human review rejected")]
    ReviewRejected,
    #[error("Approval rejected ({kind})")]
    ApprovalRejected { kind: String },
    #[error("Called workflow failed: {0}")]
    CalledWorkflowFailed(String),
    #[error("Called workflow suspended on approval '{approval_id}'")]
    NestedSuspension { approval_id: String },
}
