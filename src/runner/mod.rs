//! Run controller: session lifecycle, suspension surfacing, and the resume
//! entrypoint.
//!
//! A run snapshots the stored workflow into a new session, initializes
//! execution state, and drives the graph executor. Suspensions leave the
//! session in a `waiting_for_*` status with exactly one pending approval;
//! `resume` requires that approval to be approved and re-enters the graph,
//! replaying completed nodes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::budget::BudgetManager;
use crate::core::RuntimeContext;
use crate::error::EngineError;
use crate::executor::{GraphExecutor, NestedRunOutput, SubWorkflowRunner, ROOT_NODE_ID};
use crate::llm::{LlmExecutor, LlmProvider};
use crate::model::{ExecutionState, ExecutionStatus, Session, SessionStatus};
use crate::store::WorkflowStore;
use crate::tools::ToolRegistry;

/// Run-level configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Model handed to the provider for LLM nodes.
    pub model: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
        }
    }
}

/// Options for starting a run.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Generated when absent.
    pub session_id: Option<String>,
    pub budget_pool_id: Option<String>,
}

/// Caller-visible result of a run attempt.
///
/// A suspended run is not a failure: `success` is false and
/// `pending_approval_id` names the approval the session waits on.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: String,
    pub success: bool,
    pub output: Option<Value>,
    pub pending_approval_id: Option<String>,
    pub error: Option<String>,
}

struct ControllerInner {
    store: Arc<dyn WorkflowStore>,
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    budget: Arc<BudgetManager>,
    context: RuntimeContext,
    config: RunConfig,
}

/// Orchestrates sessions over the graph executor.
#[derive(Clone)]
pub struct RunController {
    inner: Arc<ControllerInner>,
}

impl RunController {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        budget: Arc<BudgetManager>,
        context: RuntimeContext,
        config: RunConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                store,
                provider,
                tools,
                budget,
                context,
                config,
            }),
        }
    }

    /// Start a run of a stored workflow.
    ///
    /// Fails fast with `WorkflowNotFound`; any outcome after the session is
    /// created is reported through the returned [`RunOutcome`], with the
    /// session persisted as completed, failed, or waiting.
    pub async fn start(
        &self,
        workflow_id: &str,
        input: Value,
        options: ExecuteOptions,
    ) -> Result<RunOutcome, EngineError> {
        let session_id = self.create_run(workflow_id, &options).await?;
        let result = self.run_to_completion(&session_id, Some(input)).await;
        Ok(self.outcome_from(session_id, result))
    }

    /// Resume a suspended session whose approval has been granted.
    pub async fn resume(
        &self,
        session_id: &str,
        approval_id: &str,
    ) -> Result<RunOutcome, EngineError> {
        let inner = &self.inner;
        let approval = inner
            .store
            .get_approval(approval_id)
            .await?
            .ok_or_else(|| EngineError::ApprovalNotFound(approval_id.to_string()))?;
        if approval.session_id != session_id {
            return Err(EngineError::ApprovalNotFound(approval_id.to_string()));
        }
        if approval.status != crate::model::ApprovalStatus::Approved {
            return Err(EngineError::NotApproved(approval_id.to_string()));
        }

        let mut session = inner
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        session.status = SessionStatus::Running;
        session.updated_at = inner.context.time_provider.now_ms();
        inner.store.update_session(session).await?;

        if let Some(mut execution) = inner.store.get_execution_state(session_id).await? {
            execution.status = ExecutionStatus::Running;
            inner.store.save_execution_state(execution).await?;
        }

        tracing::debug!(session = %session_id, approval = %approval_id, "resuming session");
        let result = self.run_to_completion(session_id, None).await;
        Ok(self.outcome_from(session_id.to_string(), result))
    }

    /// Create the session row and its execution state.
    async fn create_run(
        &self,
        workflow_id: &str,
        options: &ExecuteOptions,
    ) -> Result<String, EngineError> {
        let inner = &self.inner;
        let workflow = inner
            .store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(|| inner.context.id_generator.next_id());
        let now = inner.context.time_provider.now_ms();

        inner
            .store
            .create_session(Session {
                id: session_id.clone(),
                workflow_id: workflow_id.to_string(),
                workflow_snapshot: workflow,
                status: SessionStatus::Running,
                created_at: now,
                updated_at: now,
                metadata: None,
            })
            .await?;

        inner
            .store
            .save_execution_state(ExecutionState {
                session_id: session_id.clone(),
                budget_pool_id: options.budget_pool_id.clone(),
                started_at: now,
                completed_at: None,
                current_node_id: None,
                status: ExecutionStatus::Running,
                node_states: Default::default(),
                metadata: None,
            })
            .await?;

        Ok(session_id)
    }

    /// Drive the session's snapshot through the graph executor and persist
    /// the terminal status. `input` is only needed on first entry; resume
    /// recovers it from the root node state.
    async fn run_to_completion(
        &self,
        session_id: &str,
        input: Option<Value>,
    ) -> Result<Value, EngineError> {
        let inner = &self.inner;
        let session = inner
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        let execution = inner
            .store
            .get_execution_state(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        let input = match input {
            Some(value) => value,
            None => execution
                .node_states
                .get(ROOT_NODE_ID)
                .and_then(|state| state.input.clone())
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "session '{}' has no recorded root input to resume from",
                        session_id
                    ))
                })?,
        };

        let executor = GraphExecutor::new(
            Arc::clone(&inner.store),
            LlmExecutor::new(
                Arc::clone(&inner.provider),
                Arc::clone(&inner.store),
                inner.context.clone(),
            ),
            Arc::clone(&inner.tools),
            Arc::clone(&inner.budget),
            Arc::new(self.clone()),
            inner.context.clone(),
            inner.config.model.clone(),
            session_id.to_string(),
            execution.budget_pool_id.clone(),
        );

        let result = executor
            .execute(&session.workflow_snapshot.definition, &input)
            .await;
        self.record_terminal_status(session_id, &result).await?;
        result
    }

    async fn record_terminal_status(
        &self,
        session_id: &str,
        result: &Result<Value, EngineError>,
    ) -> Result<(), EngineError> {
        let inner = &self.inner;
        let now = inner.context.time_provider.now_ms();

        let mut execution = inner
            .store
            .get_execution_state(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        match result {
            Ok(_) => {
                execution.status = ExecutionStatus::Completed;
                execution.completed_at = Some(now);
            }
            Err(e) if e.is_suspension() => {
                execution.status = ExecutionStatus::Suspended;
            }
            Err(_) => {
                execution.status = ExecutionStatus::Failed;
                execution.completed_at = Some(now);
            }
        }
        inner.store.save_execution_state(execution).await?;

        // The suspension path already moved the session to its waiting
        // status; only terminal outcomes are written here.
        let session_status = match result {
            Ok(_) => Some(SessionStatus::Completed),
            Err(e) if e.is_suspension() => None,
            Err(_) => Some(SessionStatus::Failed),
        };
        if let Some(status) = session_status {
            let mut session = inner
                .store
                .get_session(session_id)
                .await?
                .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
            session.status = status;
            session.updated_at = now;
            inner.store.update_session(session).await?;
        }
        Ok(())
    }

    fn outcome_from(&self, session_id: String, result: Result<Value, EngineError>) -> RunOutcome {
        match result {
            Ok(output) => RunOutcome {
                session_id,
                success: true,
                output: Some(output),
                pending_approval_id: None,
                error: None,
            },
            Err(EngineError::Suspended { approval_id }) => RunOutcome {
                session_id,
                success: false,
                output: None,
                pending_approval_id: Some(approval_id),
                error: None,
            },
            Err(e) => RunOutcome {
                session_id,
                success: false,
                output: None,
                pending_approval_id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[async_trait]
impl SubWorkflowRunner for RunController {
    async fn run_nested(
        &self,
        workflow_id: &str,
        input: Value,
        budget_pool_id: Option<String>,
    ) -> Result<NestedRunOutput, EngineError> {
        let session_id = self
            .create_run(
                workflow_id,
                &ExecuteOptions {
                    session_id: None,
                    budget_pool_id,
                },
            )
            .await?;
        let output = self.run_to_completion(&session_id, Some(input)).await?;
        Ok(NestedRunOutput { session_id, output })
    }
}
