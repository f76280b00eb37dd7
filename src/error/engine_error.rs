use thiserror::Error;

use super::NodeError;
use crate::store::StoreError;

/// Engine-level errors surfaced by the run controller and graph executor.
///
/// `Suspended` is a control-flow signal rather than a failure: it stops the
/// run without marking the session failed and carries the approval the run
/// is waiting on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Approval not found: {0}")]
    ApprovalNotFound(String),
    #[error("Approval '{0}' is not approved")]
    NotApproved(String),
    #[error("Approval '{0}' is already resolved")]
    ApprovalAlreadyResolved(String),
    #[error("Run suspended waiting on approval '{approval_id}'")]
    Suspended { approval_id: String },
    #[error("Node '{node_id}' failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: NodeError,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True when the error is the suspension signal rather than a failure.
    pub fn is_suspension(&self) -> bool {
        matches!(self, EngineError::Suspended { .. })
    }

    pub(crate) fn node(node_id: impl Into<String>, source: NodeError) -> Self {
        EngineError::Node {
            node_id: node_id.into(),
            source,
        }
    }
}
