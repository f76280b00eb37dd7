use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ListOptions, StoreError, StoreTransaction, WorkflowStore};
use crate::model::{
    ApprovalKind, ApprovalRequest, ApprovalStatus, BudgetPool, ExecutionState, LlmExecutionRecord,
    NodeState, Session, SessionStatus, StoredWorkflow, ToolCallLog,
};

/// In-memory reference store.
///
/// Every operation is individually atomic under a single process-wide lock,
/// so the transaction handle is a no-op. Not a durability story; it exists
/// for tests and embedding.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    workflows: HashMap<String, StoredWorkflow>,
    sessions: HashMap<String, Session>,
    execution_states: HashMap<String, ExecutionState>,
    llm_executions: HashMap<String, LlmExecutionRecord>,
    tool_calls: HashMap<String, ToolCallLog>,
    budget_pools: HashMap<String, BudgetPool>,
    approvals: HashMap<String, ApprovalRequest>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct NoopTransaction;

#[async_trait]
impl StoreTransaction for NoopTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn save_workflow(&self, workflow: StoredWorkflow) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if tables.workflows.contains_key(&workflow.id) {
            return Err(StoreError::already_exists("workflow", &workflow.id));
        }
        tables.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<StoredWorkflow>, StoreError> {
        Ok(self.inner.read().workflows.get(id).cloned())
    }

    async fn list_workflows(
        &self,
        options: ListOptions,
    ) -> Result<Vec<StoredWorkflow>, StoreError> {
        let mut workflows: Vec<_> = self.inner.read().workflows.values().cloned().collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(options.apply(workflows))
    }

    async fn update_workflow(&self, workflow: StoredWorkflow) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if !tables.workflows.contains_key(&workflow.id) {
            return Err(StoreError::not_found("workflow", &workflow.id));
        }
        tables.workflows.insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn delete_workflow(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        tables
            .workflows
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("workflow", id))
    }

    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if tables.sessions.contains_key(&session.id) {
            return Err(StoreError::already_exists("session", &session.id));
        }
        tables.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.read().sessions.get(id).cloned())
    }

    async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
        options: ListOptions,
    ) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<_> = self
            .inner
            .read()
            .sessions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(options.apply(sessions))
    }

    async fn update_session(&self, session: Session) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if !tables.sessions.contains_key(&session.id) {
            return Err(StoreError::not_found("session", &session.id));
        }
        tables.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if tables.sessions.remove(id).is_none() {
            return Err(StoreError::not_found("session", id));
        }
        tables.execution_states.remove(id);
        let execution_ids: Vec<String> = tables
            .llm_executions
            .values()
            .filter(|r| r.session_id == id)
            .map(|r| r.id.clone())
            .collect();
        tables.llm_executions.retain(|_, r| r.session_id != id);
        tables
            .tool_calls
            .retain(|_, log| !execution_ids.contains(&log.execution_id));
        tables.approvals.retain(|_, a| a.session_id != id);
        Ok(())
    }

    async fn save_execution_state(&self, state: ExecutionState) -> Result<(), StoreError> {
        self.inner
            .write()
            .execution_states
            .insert(state.session_id.clone(), state);
        Ok(())
    }

    async fn get_execution_state(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionState>, StoreError> {
        Ok(self.inner.read().execution_states.get(session_id).cloned())
    }

    async fn update_node_state(
        &self,
        session_id: &str,
        state: NodeState,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        let execution = tables
            .execution_states
            .get_mut(session_id)
            .ok_or_else(|| StoreError::not_found("execution state", session_id))?;
        execution.node_states.insert(state.node_id.clone(), state);
        Ok(())
    }

    async fn save_llm_execution(&self, record: LlmExecutionRecord) -> Result<(), StoreError> {
        self.inner
            .write()
            .llm_executions
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn list_llm_executions_by_session(
        &self,
        session_id: &str,
        options: ListOptions,
    ) -> Result<Vec<LlmExecutionRecord>, StoreError> {
        let mut records: Vec<_> = self
            .inner
            .read()
            .llm_executions
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(options.apply(records))
    }

    async fn list_llm_executions_by_node(
        &self,
        session_id: &str,
        node_id: &str,
        options: ListOptions,
    ) -> Result<Vec<LlmExecutionRecord>, StoreError> {
        let mut records: Vec<_> = self
            .inner
            .read()
            .llm_executions
            .values()
            .filter(|r| r.session_id == session_id && r.node_id == node_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(options.apply(records))
    }

    async fn create_budget_pool(&self, pool: BudgetPool) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if tables.budget_pools.contains_key(&pool.id) {
            return Err(StoreError::already_exists("budget pool", &pool.id));
        }
        tables.budget_pools.insert(pool.id.clone(), pool);
        Ok(())
    }

    async fn get_budget_pool(&self, id: &str) -> Result<Option<BudgetPool>, StoreError> {
        Ok(self.inner.read().budget_pools.get(id).cloned())
    }

    async fn update_budget_pool(
        &self,
        pool: BudgetPool,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        let existing = tables
            .budget_pools
            .get_mut(&pool.id)
            .ok_or_else(|| StoreError::not_found("budget pool", &pool.id))?;
        if existing.version != expected_version {
            return Err(StoreError::VersionConflict { id: pool.id });
        }
        let mut updated = pool;
        updated.version = expected_version + 1;
        *existing = updated;
        Ok(())
    }

    async fn list_child_pools(&self, parent_id: &str) -> Result<Vec<BudgetPool>, StoreError> {
        let mut pools: Vec<_> = self
            .inner
            .read()
            .budget_pools
            .values()
            .filter(|p| p.parent_pool_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        pools.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pools)
    }

    async fn log_tool_call(&self, log: ToolCallLog) -> Result<(), StoreError> {
        self.inner.write().tool_calls.insert(log.id.clone(), log);
        Ok(())
    }

    async fn list_tool_calls_by_execution(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ToolCallLog>, StoreError> {
        let mut logs: Vec<_> = self
            .inner
            .read()
            .tool_calls
            .values()
            .filter(|log| log.execution_id == execution_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(logs)
    }

    async fn list_tool_calls_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ToolCallLog>, StoreError> {
        let tables = self.inner.read();
        let execution_ids: Vec<&String> = tables
            .llm_executions
            .values()
            .filter(|r| r.session_id == session_id)
            .map(|r| &r.id)
            .collect();
        let mut logs: Vec<_> = tables
            .tool_calls
            .values()
            .filter(|log| execution_ids.contains(&&log.execution_id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(logs)
    }

    async fn create_approval(&self, approval: ApprovalRequest) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if tables.approvals.contains_key(&approval.id) {
            return Err(StoreError::already_exists("approval", &approval.id));
        }
        tables.approvals.insert(approval.id.clone(), approval);
        Ok(())
    }

    async fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.inner.read().approvals.get(id).cloned())
    }

    async fn list_approvals_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let mut approvals: Vec<_> = self
            .inner
            .read()
            .approvals
            .values()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(approvals)
    }

    async fn list_pending_approvals(
        &self,
        kind: Option<ApprovalKind>,
        options: ListOptions,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let mut approvals: Vec<_> = self
            .inner
            .read()
            .approvals
            .values()
            .filter(|a| a.status == ApprovalStatus::Pending)
            .filter(|a| kind.map_or(true, |wanted| a.kind == wanted))
            .cloned()
            .collect();
        approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(options.apply(approvals))
    }

    async fn update_approval(&self, approval: ApprovalRequest) -> Result<(), StoreError> {
        let mut tables = self.inner.write();
        if !tables.approvals.contains_key(&approval.id) {
            return Err(StoreError::not_found("approval", &approval.id));
        }
        tables.approvals.insert(approval.id.clone(), approval);
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(NoopTransaction))
    }
}
