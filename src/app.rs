//! Public surface of the core: a factory-built handle owning the store,
//! provider, tool registry, and budget manager.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::budget::{BudgetError, BudgetManager};
use crate::core::RuntimeContext;
use crate::error::{EngineError, NodeError};
use crate::llm::{GenerateTextRequest, GenerateTextResponse, LlmError, LlmProvider};
use crate::model::{
    ApprovalContext, ApprovalKind, ApprovalRequest, ApprovalStatus, ExecutionState,
    ExecutionStatus, MessageType, Node, NodeStatus, Session, SessionStatus, StoredWorkflow,
};
use crate::runner::{ExecuteOptions, RunConfig, RunController, RunOutcome};
use crate::store::{InMemoryStore, ListOptions, WorkflowStore};
use crate::tools::{ToolDefinition, ToolRegistry};

/// A workflow to be saved; id and timestamps are filled in by the app.
#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub id: Option<String>,
    pub name: String,
    pub version: String,
    pub definition: Node,
    pub typedefs: std::collections::BTreeMap<String, MessageType>,
    pub metadata: Option<Value>,
}

/// Provider used when the embedder registers none; every LLM node fails
/// with a clear message instead of panicking.
struct NullProvider;

#[async_trait]
impl LlmProvider for NullProvider {
    async fn generate_text(
        &self,
        _request: GenerateTextRequest,
    ) -> Result<GenerateTextResponse, LlmError> {
        Err(LlmError::Provider("no LLM provider configured".to_string()))
    }
}

pub struct WorkflowAppBuilder {
    store: Option<Arc<dyn WorkflowStore>>,
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    context: RuntimeContext,
    config: RunConfig,
}

impl WorkflowAppBuilder {
    pub fn store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn register_tool(mut self, name: impl Into<String>, definition: ToolDefinition) -> Self {
        self.tools.register(name, definition);
        self
    }

    pub fn context(mut self, context: RuntimeContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> WorkflowApp {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let provider = self.provider.unwrap_or_else(|| Arc::new(NullProvider));
        let budget = Arc::new(BudgetManager::new(
            Arc::clone(&store),
            self.context.clone(),
        ));
        let controller = RunController::new(
            Arc::clone(&store),
            provider,
            Arc::new(self.tools),
            Arc::clone(&budget),
            self.context.clone(),
            self.config,
        );
        WorkflowApp {
            store,
            controller,
            budget,
            context: self.context,
        }
    }
}

/// Application handle over the orchestration core.
pub struct WorkflowApp {
    store: Arc<dyn WorkflowStore>,
    controller: RunController,
    budget: Arc<BudgetManager>,
    context: RuntimeContext,
}

impl WorkflowApp {
    pub fn builder() -> WorkflowAppBuilder {
        WorkflowAppBuilder {
            store: None,
            provider: None,
            tools: ToolRegistry::new(),
            context: RuntimeContext::default(),
            config: RunConfig::default(),
        }
    }

    pub async fn initialize(&self) -> Result<(), EngineError> {
        tracing::debug!("workflow app initialized");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), EngineError> {
        tracing::debug!("workflow app closed");
        Ok(())
    }

    pub async fn save_workflow(
        &self,
        workflow: NewWorkflow,
    ) -> Result<StoredWorkflow, EngineError> {
        let now = self.context.time_provider.now_ms();
        let stored = StoredWorkflow {
            id: workflow
                .id
                .unwrap_or_else(|| self.context.id_generator.next_id()),
            name: workflow.name,
            version: workflow.version,
            definition: workflow.definition,
            typedefs: workflow.typedefs,
            created_at: now,
            updated_at: now,
            metadata: workflow.metadata,
        };
        self.store.save_workflow(stored.clone()).await?;
        Ok(stored)
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<StoredWorkflow>, EngineError> {
        Ok(self.store.get_workflow(id).await?)
    }

    pub async fn list_workflows(
        &self,
        options: ListOptions,
    ) -> Result<Vec<StoredWorkflow>, EngineError> {
        Ok(self.store.list_workflows(options).await?)
    }

    /// Run a stored workflow. Suspensions and failures are reported through
    /// the outcome; only caller mistakes (unknown workflow, store failures)
    /// raise.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        input: Value,
        options: ExecuteOptions,
    ) -> Result<RunOutcome, EngineError> {
        self.controller.start(workflow_id, input, options).await
    }

    /// Re-enter a session whose pending approval has been approved.
    pub async fn resume_session(
        &self,
        session_id: &str,
        approval_id: &str,
    ) -> Result<RunOutcome, EngineError> {
        self.controller.resume(session_id, approval_id).await
    }

    /// Approve a pending request. A `budget_increase` approval also tops up
    /// the session's pool by the requested amount, so resume can pass the
    /// consume that suspended it.
    pub async fn approve_request(
        &self,
        approval_id: &str,
        approved_by: &str,
        notes: Option<String>,
    ) -> Result<ApprovalRequest, EngineError> {
        let existing = self
            .store
            .get_approval(approval_id)
            .await?
            .ok_or_else(|| EngineError::ApprovalNotFound(approval_id.to_string()))?;
        if existing.status != ApprovalStatus::Pending {
            return Err(EngineError::ApprovalAlreadyResolved(approval_id.to_string()));
        }

        let now = self.context.time_provider.now_ms();
        let approval = self
            .store
            .approve_approval(approval_id, approved_by, notes, now)
            .await?;

        if let ApprovalContext::BudgetIncrease {
            requested_budget, ..
        } = &approval.context
        {
            match self
                .store
                .get_execution_state(&approval.session_id)
                .await?
                .and_then(|state| state.budget_pool_id)
            {
                Some(pool_id) => {
                    self.budget
                        .increase(&pool_id, *requested_budget)
                        .await
                        .map_err(|e: BudgetError| EngineError::Internal(e.to_string()))?;
                }
                None => {
                    tracing::warn!(
                        approval = %approval.id,
                        session = %approval.session_id,
                        "budget increase approved but session has no budget pool"
                    );
                }
            }
        }

        Ok(approval)
    }

    /// Reject a pending request. The waiting node and its session fail
    /// terminally, so a rejected run is observable without a resume call.
    pub async fn reject_request(
        &self,
        approval_id: &str,
        rejected_by: &str,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, EngineError> {
        let existing = self
            .store
            .get_approval(approval_id)
            .await?
            .ok_or_else(|| EngineError::ApprovalNotFound(approval_id.to_string()))?;
        if existing.status != ApprovalStatus::Pending {
            return Err(EngineError::ApprovalAlreadyResolved(approval_id.to_string()));
        }

        let now = self.context.time_provider.now_ms();
        let approval = self
            .store
            .reject_approval(approval_id, rejected_by, reason, now)
            .await?;

        let failure = match approval.kind {
            ApprovalKind::HumanReview => NodeError::ReviewRejected.to_string(),
            ApprovalKind::BudgetIncrease => NodeError::ApprovalRejected {
                kind: "budget_increase".to_string(),
            }
            .to_string(),
            ApprovalKind::WorkflowCall => NodeError::ApprovalRejected {
                kind: "workflow_call".to_string(),
            }
            .to_string(),
        };

        if let Some(mut execution) = self
            .store
            .get_execution_state(&approval.session_id)
            .await?
        {
            if let Some(state) = execution.node_states.get_mut(&approval.node_id) {
                if matches!(
                    state.status,
                    NodeStatus::WaitingForApproval | NodeStatus::WaitingForReview
                ) {
                    state.status = NodeStatus::Failed;
                    state.error = Some(failure.clone());
                    state.completed_at = Some(now);
                }
            }
            execution.status = ExecutionStatus::Failed;
            execution.completed_at = Some(now);
            self.store.save_execution_state(execution).await?;
        }

        if let Some(mut session) = self.store.get_session(&approval.session_id).await? {
            session.status = SessionStatus::Failed;
            session.updated_at = now;
            self.store.update_session(session).await?;
        }

        Ok(approval)
    }

    // Read accessors for embedders and tests.

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, EngineError> {
        Ok(self.store.get_session(id).await?)
    }

    pub async fn get_execution_state(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionState>, EngineError> {
        Ok(self.store.get_execution_state(session_id).await?)
    }

    pub async fn get_approval_request(
        &self,
        id: &str,
    ) -> Result<Option<ApprovalRequest>, EngineError> {
        Ok(self.store.get_approval(id).await?)
    }

    pub async fn list_pending_approvals(
        &self,
        kind: Option<ApprovalKind>,
    ) -> Result<Vec<ApprovalRequest>, EngineError> {
        Ok(self
            .store
            .list_pending_approvals(kind, ListOptions::default())
            .await?)
    }

    pub fn budget(&self) -> &BudgetManager {
        &self.budget
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }
}
