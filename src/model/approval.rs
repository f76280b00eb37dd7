use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pending decision that pauses a session until an external actor resolves
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub session_id: String,
    /// Qualified id of the node that emitted the request.
    pub node_id: String,
    pub kind: ApprovalKind,
    pub status: ApprovalStatus,
    pub context: ApprovalContext,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    HumanReview,
    BudgetIncrease,
    WorkflowCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// Typed payload carried by an approval request.
///
/// Human review suspends before the provider call, so `llm_output` carries
/// the node's input (what the reviewer gates on).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalContext {
    HumanReview { llm_output: Value },
    BudgetIncrease { requested_budget: i64, current_usage: i64 },
    WorkflowCall { workflow_ref: String },
}

impl ApprovalContext {
    pub fn kind(&self) -> ApprovalKind {
        match self {
            ApprovalContext::HumanReview { .. } => ApprovalKind::HumanReview,
            ApprovalContext::BudgetIncrease { .. } => ApprovalKind::BudgetIncrease,
            ApprovalContext::WorkflowCall { .. } => ApprovalKind::WorkflowCall,
        }
    }
}
