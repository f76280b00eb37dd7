use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message_type::MessageType;
use super::node::Node;

/// A stored workflow definition, immutable per version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub id: String,
    pub name: String,
    pub version: String,
    pub definition: Node,
    #[serde(default)]
    pub typedefs: BTreeMap<String, MessageType>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One execution instance of a workflow.
///
/// `workflow_snapshot` is the frozen definition used by this run; the
/// workflow row may be updated later without affecting in-flight sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub workflow_id: String,
    pub workflow_snapshot: StoredWorkflow,
    pub status: SessionStatus,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    WaitingForHumanReview,
    WaitingForBudgetApproval,
    WaitingForWorkflowApproval,
}

impl SessionStatus {
    /// True for any of the `waiting_for_*` statuses.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            SessionStatus::WaitingForHumanReview
                | SessionStatus::WaitingForBudgetApproval
                | SessionStatus::WaitingForWorkflowApproval
        )
    }
}

/// Durable traversal state for a session. One row per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_pool_id: Option<String>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    pub status: ExecutionStatus,
    /// Keyed by qualified node id (dotted path), so the same local id in two
    /// groups produces distinct rows.
    #[serde(default)]
    pub node_states: BTreeMap<String, NodeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Suspended,
}

/// Persisted state of a single node execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    /// Qualified node id.
    pub node_id: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    WaitingForApproval,
    WaitingForReview,
}
