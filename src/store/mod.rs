//! Store contract consumed by the core, plus the in-memory reference
//! implementation.
//!
//! The contract is grouped by entity: workflows, sessions, execution state
//! (with per-node state rows), LLM execution records, budget pools, tool-call
//! logs, and approval requests. Deleting a session cascades to its execution
//! state, LLM records (with their tool-call logs), and approvals; budget
//! pools are independent of sessions.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::model::{
    ApprovalKind, ApprovalRequest, ApprovalStatus, BudgetPool, ExecutionState, LlmExecutionRecord,
    NodeState, Session, SessionStatus, StoredWorkflow, ToolCallLog,
};

/// Pagination for list operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListOptions {
    pub(crate) fn apply<T>(&self, mut items: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0);
        if offset > 0 {
            items = items.into_iter().skip(offset).collect();
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }
}

/// A transaction handle. Multi-entity updates that must be consistent are
/// wrapped between `begin_transaction` and `commit`.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Durable storage consumed by the orchestration core.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // --- workflows ---

    async fn save_workflow(&self, workflow: StoredWorkflow) -> Result<(), StoreError>;
    async fn get_workflow(&self, id: &str) -> Result<Option<StoredWorkflow>, StoreError>;
    async fn list_workflows(&self, options: ListOptions) -> Result<Vec<StoredWorkflow>, StoreError>;
    async fn update_workflow(&self, workflow: StoredWorkflow) -> Result<(), StoreError>;
    async fn delete_workflow(&self, id: &str) -> Result<(), StoreError>;

    // --- sessions ---

    async fn create_session(&self, session: Session) -> Result<(), StoreError>;
    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;
    async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
        options: ListOptions,
    ) -> Result<Vec<Session>, StoreError>;
    async fn update_session(&self, session: Session) -> Result<(), StoreError>;
    /// Cascades to execution state, LLM records (and their tool-call logs),
    /// and approvals.
    async fn delete_session(&self, id: &str) -> Result<(), StoreError>;

    // --- execution state ---

    /// Upsert keyed by `session_id` (unique per session).
    async fn save_execution_state(&self, state: ExecutionState) -> Result<(), StoreError>;
    async fn get_execution_state(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionState>, StoreError>;
    /// Upsert one node-state row, keyed by `(session_id, state.node_id)`.
    async fn update_node_state(
        &self,
        session_id: &str,
        state: NodeState,
    ) -> Result<(), StoreError>;

    // --- LLM executions ---

    async fn save_llm_execution(&self, record: LlmExecutionRecord) -> Result<(), StoreError>;
    async fn list_llm_executions_by_session(
        &self,
        session_id: &str,
        options: ListOptions,
    ) -> Result<Vec<LlmExecutionRecord>, StoreError>;
    async fn list_llm_executions_by_node(
        &self,
        session_id: &str,
        node_id: &str,
        options: ListOptions,
    ) -> Result<Vec<LlmExecutionRecord>, StoreError>;

    // --- budget pools ---

    async fn create_budget_pool(&self, pool: BudgetPool) -> Result<(), StoreError>;
    async fn get_budget_pool(&self, id: &str) -> Result<Option<BudgetPool>, StoreError>;
    /// Compare-and-update guarded by the pool version: fails with
    /// [`StoreError::VersionConflict`] when the stored version differs from
    /// `expected_version`. On success the stored version is bumped.
    async fn update_budget_pool(
        &self,
        pool: BudgetPool,
        expected_version: u64,
    ) -> Result<(), StoreError>;
    async fn list_child_pools(&self, parent_id: &str) -> Result<Vec<BudgetPool>, StoreError>;

    // --- tool-call logs ---

    async fn log_tool_call(&self, log: ToolCallLog) -> Result<(), StoreError>;
    async fn list_tool_calls_by_execution(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ToolCallLog>, StoreError>;
    async fn list_tool_calls_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ToolCallLog>, StoreError>;

    // --- approvals ---

    async fn create_approval(&self, approval: ApprovalRequest) -> Result<(), StoreError>;
    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, StoreError>;
    async fn list_approvals_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;
    async fn list_pending_approvals(
        &self,
        kind: Option<ApprovalKind>,
        options: ListOptions,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;
    async fn update_approval(&self, approval: ApprovalRequest) -> Result<(), StoreError>;

    /// Resolve a pending approval as approved.
    async fn approve_approval(
        &self,
        id: &str,
        resolved_by: &str,
        notes: Option<String>,
        resolved_at: i64,
    ) -> Result<ApprovalRequest, StoreError> {
        let mut approval = self
            .get_approval(id)
            .await?
            .ok_or_else(|| StoreError::not_found("approval", id))?;
        approval.status = ApprovalStatus::Approved;
        approval.resolved_at = Some(resolved_at);
        approval.resolved_by = Some(resolved_by.to_string());
        approval.resolution_notes = notes;
        self.update_approval(approval.clone()).await?;
        Ok(approval)
    }

    /// Resolve a pending approval as rejected.
    async fn reject_approval(
        &self,
        id: &str,
        resolved_by: &str,
        reason: Option<String>,
        resolved_at: i64,
    ) -> Result<ApprovalRequest, StoreError> {
        let mut approval = self
            .get_approval(id)
            .await?
            .ok_or_else(|| StoreError::not_found("approval", id))?;
        approval.status = ApprovalStatus::Rejected;
        approval.resolved_at = Some(resolved_at);
        approval.resolved_by = Some(resolved_by.to_string());
        approval.resolution_notes = reason;
        self.update_approval(approval.clone()).await?;
        Ok(approval)
    }

    // --- transactions ---

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}
