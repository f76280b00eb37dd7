//! Graph executor: per-node dispatch, group traversal with entry/exit
//! sentinels, edge projection, and persisted node-state transitions.
//!
//! Every node execution is keyed by its qualified id (dotted path from the
//! root group), so the same local id in two groups produces distinct state
//! rows. Re-entry is idempotent: completed nodes replay their recorded
//! output, and a node waiting on an approved request proceeds past its gate.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::budget::{BudgetError, BudgetManager};
use crate::core::RuntimeContext;
use crate::error::{EngineError, NodeError};
use crate::llm::{LlmCall, LlmExecutor};
use crate::model::{
    ApprovalContext, ApprovalKind, ApprovalRequest, ApprovalStatus, CallWorkflowNode, GroupNode,
    LlmNode, Node, NodeState, NodeStatus, SessionStatus, TransformNode,
};
use crate::store::WorkflowStore;
use crate::tools::ToolRegistry;
use crate::transform::eval;

/// Qualified id of the root node.
pub const ROOT_NODE_ID: &str = "root";

/// Output of a nested workflow run started by a `call_workflow` node.
pub struct NestedRunOutput {
    pub session_id: String,
    pub output: Value,
}

/// Starts nested runs for `call_workflow` nodes. Implemented by the run
/// controller; a trait seam so the executor stays free of the session
/// lifecycle.
#[async_trait]
pub trait SubWorkflowRunner: Send + Sync {
    async fn run_nested(
        &self,
        workflow_id: &str,
        input: Value,
        budget_pool_id: Option<String>,
    ) -> Result<NestedRunOutput, EngineError>;
}

/// Per-run executor over one session's workflow snapshot.
pub struct GraphExecutor {
    store: Arc<dyn WorkflowStore>,
    llm: LlmExecutor,
    tools: Arc<ToolRegistry>,
    budget: Arc<BudgetManager>,
    sub_runner: Arc<dyn SubWorkflowRunner>,
    context: RuntimeContext,
    model: String,
    session_id: String,
    budget_pool_id: Option<String>,
}

impl GraphExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        llm: LlmExecutor,
        tools: Arc<ToolRegistry>,
        budget: Arc<BudgetManager>,
        sub_runner: Arc<dyn SubWorkflowRunner>,
        context: RuntimeContext,
        model: String,
        session_id: String,
        budget_pool_id: Option<String>,
    ) -> Self {
        Self {
            store,
            llm,
            tools,
            budget,
            sub_runner,
            context,
            model,
            session_id,
            budget_pool_id,
        }
    }

    /// Execute the workflow definition against `input`.
    pub async fn execute(&self, definition: &Node, input: &Value) -> Result<Value, EngineError> {
        self.execute_node(ROOT_NODE_ID, definition, input).await
    }

    /// Execute one node under its qualified id, persisting the state
    /// transitions around the dispatch.
    async fn execute_node(
        &self,
        qualified_id: &str,
        node: &Node,
        input: &Value,
    ) -> Result<Value, EngineError> {
        if let Some(value) = self.consult_existing_state(qualified_id).await? {
            return value;
        }

        self.mark_running(qualified_id, input).await?;

        let result = match node {
            Node::Group(group) => {
                // Boxed to keep the recursive future finite.
                Box::pin(self.execute_group(qualified_id, group, input)).await
            }
            Node::Transform(transform) => self.execute_transform(qualified_id, transform, input),
            Node::Llm(llm) => self.execute_llm(qualified_id, llm, input).await,
            Node::CallWorkflow(call) => self.execute_call(qualified_id, call, input).await,
            Node::Stream(_) => Err(EngineError::node(
                qualified_id,
                NodeError::Unimplemented("stream"),
            )),
            Node::Generator(_) => Err(EngineError::node(
                qualified_id,
                NodeError::Unimplemented("generator"),
            )),
        };

        match result {
            Ok(output) => {
                self.mark_completed(qualified_id, &output).await?;
                Ok(output)
            }
            Err(e) if e.is_suspension() => Err(e),
            Err(e) => {
                self.mark_failed(qualified_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Replay or gate on a previously persisted node state.
    ///
    /// Returns `Some` when the caller should short-circuit: a completed node
    /// replays its output; a node still gated on a pending approval
    /// re-raises the suspension; a rejected approval fails the node.
    async fn consult_existing_state(
        &self,
        qualified_id: &str,
    ) -> Result<Option<Result<Value, EngineError>>, EngineError> {
        let Some(state) = self.node_state(qualified_id).await? else {
            return Ok(None);
        };
        match state.status {
            NodeStatus::Completed => Ok(Some(Ok(state.output.unwrap_or(Value::Null)))),
            NodeStatus::WaitingForApproval | NodeStatus::WaitingForReview => {
                let approval_id = state.pending_approval_id.ok_or_else(|| {
                    EngineError::Internal(format!(
                        "node '{}' is waiting without an approval id",
                        qualified_id
                    ))
                })?;
                let approval = self
                    .store
                    .get_approval(&approval_id)
                    .await?
                    .ok_or_else(|| EngineError::ApprovalNotFound(approval_id.clone()))?;
                match approval.status {
                    ApprovalStatus::Approved => Ok(None),
                    ApprovalStatus::Rejected => {
                        let err = match approval.kind {
                            ApprovalKind::HumanReview => NodeError::ReviewRejected,
                            ApprovalKind::BudgetIncrease => NodeError::ApprovalRejected {
                                kind: "budget_increase".to_string(),
                            },
                            ApprovalKind::WorkflowCall => NodeError::ApprovalRejected {
                                kind: "workflow_call".to_string(),
                            },
                        };
                        self.mark_failed(qualified_id, &err.to_string()).await?;
                        Ok(Some(Err(EngineError::node(qualified_id, err))))
                    }
                    ApprovalStatus::Pending | ApprovalStatus::Expired => {
                        Ok(Some(Err(EngineError::Suspended { approval_id })))
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// Walk a group from its entry sentinel to its exit sentinel.
    async fn execute_group(
        &self,
        qualifier: &str,
        group: &GroupNode,
        input: &Value,
    ) -> Result<Value, EngineError> {
        let mut current_id = group.entry_point.clone();
        let mut current_value = input.clone();
        let mut visited: HashSet<String> = HashSet::new();

        loop {
            if current_id == group.exit_point {
                return Ok(current_value);
            }
            if !visited.insert(current_id.clone()) {
                return Err(EngineError::node(
                    qualify(qualifier, &current_id),
                    NodeError::CycleDetected {
                        node_id: current_id,
                    },
                ));
            }

            let edge = group
                .edges
                .iter()
                .find(|e| e.from == current_id)
                .ok_or_else(|| {
                    EngineError::node(
                        qualify(qualifier, &current_id),
                        NodeError::DanglingNode {
                            node_id: current_id.clone(),
                        },
                    )
                })?;

            let output = if let Some(child) = group.nodes.get(&current_id) {
                let child_id = qualify(qualifier, &current_id);
                self.execute_node(&child_id, child, &current_value).await?
            } else {
                // Entry sentinel: the group's input passes through.
                current_value.clone()
            };

            let mut next_value = match (&edge.output_field, output) {
                (Some(field), Value::Object(map)) => {
                    map.get(field).cloned().unwrap_or(Value::Null)
                }
                (_, whole) => whole,
            };
            if let Some(field) = &edge.input_field {
                let mut wrapped = Map::new();
                wrapped.insert(field.clone(), next_value);
                next_value = Value::Object(wrapped);
            }

            if edge.to != group.exit_point && visited.contains(&edge.to) {
                let err = NodeError::CycleDetected {
                    node_id: edge.to.clone(),
                };
                // The node that produced the back-edge carries the failure.
                if group.nodes.contains_key(&current_id) {
                    self.mark_failed(&qualify(qualifier, &current_id), &err.to_string())
                        .await?;
                }
                return Err(EngineError::node(qualify(qualifier, &current_id), err));
            }

            current_id = edge.to.clone();
            current_value = next_value;
        }
    }

    fn execute_transform(
        &self,
        qualified_id: &str,
        node: &TransformNode,
        input: &Value,
    ) -> Result<Value, EngineError> {
        eval(&node.expr, input, &[])
            .map_err(|e| EngineError::node(qualified_id, NodeError::Transform(e)))
    }

    async fn execute_llm(
        &self,
        qualified_id: &str,
        node: &LlmNode,
        input: &Value,
    ) -> Result<Value, EngineError> {
        if node.requires_human_review
            && !self
                .has_approved(qualified_id, ApprovalKind::HumanReview)
                .await?
        {
            let suspension = self
                .suspend(
                    qualified_id,
                    input,
                    ApprovalContext::HumanReview {
                        llm_output: input.clone(),
                    },
                    NodeStatus::WaitingForReview,
                    SessionStatus::WaitingForHumanReview,
                )
                .await?;
            return Err(suspension);
        }

        let mut tools = Vec::new();
        if let Some(names) = &node.available_tools {
            for name in names {
                let definition = self.tools.get(name).ok_or_else(|| {
                    EngineError::node(qualified_id, NodeError::UnknownTool(name.clone()))
                })?;
                tools.push((name.clone(), definition.clone()));
            }
        }

        let outcome = self
            .llm
            .execute(
                input,
                LlmCall {
                    model: self.model.clone(),
                    system_prompt: node.system_prompt.clone(),
                    tools,
                    max_retries: node.max_retries,
                    session_id: self.session_id.clone(),
                    node_id: qualified_id.to_string(),
                },
            )
            .await?;

        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "unknown provider error".to_string());
            return Err(EngineError::node(
                qualified_id,
                NodeError::LlmFailed(message),
            ));
        }

        if let (Some(pool_id), Some(usage)) = (&self.budget_pool_id, outcome.usage) {
            if usage.total_tokens > 0 {
                match self.budget.consume(pool_id, usage.total_tokens).await {
                    Ok(()) => {}
                    Err(BudgetError::BudgetExhausted { requested, .. }) => {
                        let current_usage = self
                            .budget
                            .get(pool_id)
                            .await
                            .map(|p| p.used_budget)
                            .unwrap_or_default();
                        let suspension = self
                            .suspend(
                                qualified_id,
                                input,
                                ApprovalContext::BudgetIncrease {
                                    requested_budget: requested,
                                    current_usage,
                                },
                                NodeStatus::WaitingForApproval,
                                SessionStatus::WaitingForBudgetApproval,
                            )
                            .await?;
                        return Err(suspension);
                    }
                    Err(e) => {
                        return Err(EngineError::node(qualified_id, NodeError::Budget(e)));
                    }
                }
            }
        }

        Ok(outcome.text.map(Value::String).unwrap_or(Value::Null))
    }

    async fn execute_call(
        &self,
        qualified_id: &str,
        node: &CallWorkflowNode,
        input: &Value,
    ) -> Result<Value, EngineError> {
        if node.requires_approval
            && !self
                .has_approved(qualified_id, ApprovalKind::WorkflowCall)
                .await?
        {
            let suspension = self
                .suspend(
                    qualified_id,
                    input,
                    ApprovalContext::WorkflowCall {
                        workflow_ref: node.workflow_ref.clone(),
                    },
                    NodeStatus::WaitingForApproval,
                    SessionStatus::WaitingForWorkflowApproval,
                )
                .await?;
            return Err(suspension);
        }

        let nested_input = match &node.input_mapping {
            Some(expr) => eval(expr, input, &[])
                .map_err(|e| EngineError::node(qualified_id, NodeError::Transform(e)))?,
            None => input.clone(),
        };

        let nested = self
            .sub_runner
            .run_nested(
                &node.workflow_ref,
                nested_input,
                self.budget_pool_id.clone(),
            )
            .await;

        let output = match nested {
            Ok(run) => run.output,
            Err(e @ EngineError::WorkflowNotFound(_)) => return Err(e),
            Err(EngineError::Suspended { approval_id }) => {
                return Err(EngineError::node(
                    qualified_id,
                    NodeError::NestedSuspension { approval_id },
                ));
            }
            Err(e) => {
                return Err(EngineError::node(
                    qualified_id,
                    NodeError::CalledWorkflowFailed(e.to_string()),
                ));
            }
        };

        match &node.output_mapping {
            Some(expr) => eval(expr, &output, &[])
                .map_err(|e| EngineError::node(qualified_id, NodeError::Transform(e))),
            None => Ok(output),
        }
    }

    /// Emit an approval request, move the session and node into their
    /// waiting states, and return the suspension signal to raise.
    async fn suspend(
        &self,
        qualified_id: &str,
        input: &Value,
        context: ApprovalContext,
        node_status: NodeStatus,
        session_status: SessionStatus,
    ) -> Result<EngineError, EngineError> {
        let approval_id = self.context.id_generator.next_id();
        let now = self.context.time_provider.now_ms();

        self.store
            .create_approval(ApprovalRequest {
                id: approval_id.clone(),
                session_id: self.session_id.clone(),
                node_id: qualified_id.to_string(),
                kind: context.kind(),
                status: ApprovalStatus::Pending,
                context,
                created_at: now,
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
            })
            .await?;

        let mut session = self
            .store
            .get_session(&self.session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(self.session_id.clone()))?;
        session.status = session_status;
        session.updated_at = now;
        self.store.update_session(session).await?;

        let mut state = self
            .node_state(qualified_id)
            .await?
            .unwrap_or_else(|| blank_state(qualified_id));
        state.status = node_status;
        state.input = Some(input.clone());
        state.pending_approval_id = Some(approval_id.clone());
        self.store
            .update_node_state(&self.session_id, state)
            .await?;

        tracing::debug!(
            session = %self.session_id,
            node = %qualified_id,
            approval = %approval_id,
            "run suspended for approval"
        );
        Ok(EngineError::Suspended { approval_id })
    }

    /// Whether `(session, node)` already carries an approved request of the
    /// given kind.
    async fn has_approved(
        &self,
        qualified_id: &str,
        kind: ApprovalKind,
    ) -> Result<bool, EngineError> {
        let approvals = self
            .store
            .list_approvals_by_session(&self.session_id)
            .await?;
        Ok(approvals.iter().any(|a| {
            a.node_id == qualified_id && a.kind == kind && a.status == ApprovalStatus::Approved
        }))
    }

    async fn node_state(&self, qualified_id: &str) -> Result<Option<NodeState>, EngineError> {
        Ok(self
            .store
            .get_execution_state(&self.session_id)
            .await?
            .and_then(|state| state.node_states.get(qualified_id).cloned()))
    }

    async fn mark_running(&self, qualified_id: &str, input: &Value) -> Result<(), EngineError> {
        let mut execution = self
            .store
            .get_execution_state(&self.session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(self.session_id.clone()))?;
        execution.current_node_id = Some(qualified_id.to_string());
        self.store.save_execution_state(execution).await?;

        let state = NodeState {
            node_id: qualified_id.to_string(),
            status: NodeStatus::Running,
            input: Some(input.clone()),
            output: None,
            error: None,
            started_at: Some(self.context.time_provider.now_ms()),
            completed_at: None,
            retry_count: 0,
            pending_approval_id: None,
            metadata: None,
        };
        self.store
            .update_node_state(&self.session_id, state)
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, qualified_id: &str, output: &Value) -> Result<(), EngineError> {
        let mut state = self
            .node_state(qualified_id)
            .await?
            .unwrap_or_else(|| blank_state(qualified_id));
        state.status = NodeStatus::Completed;
        state.output = Some(output.clone());
        state.error = None;
        state.pending_approval_id = None;
        state.completed_at = Some(self.context.time_provider.now_ms());
        self.store
            .update_node_state(&self.session_id, state)
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, qualified_id: &str, message: &str) -> Result<(), EngineError> {
        let mut state = self
            .node_state(qualified_id)
            .await?
            .unwrap_or_else(|| blank_state(qualified_id));
        state.status = NodeStatus::Failed;
        state.error = Some(message.to_string());
        state.completed_at = Some(self.context.time_provider.now_ms());
        self.store
            .update_node_state(&self.session_id, state)
            .await?;
        Ok(())
    }
}

fn qualify(qualifier: &str, local_id: &str) -> String {
    format!("{}.{}", qualifier, local_id)
}

fn blank_state(qualified_id: &str) -> NodeState {
    NodeState {
        node_id: qualified_id.to_string(),
        status: NodeStatus::Pending,
        input: None,
        output: None,
        error: None,
        started_at: None,
        completed_at: None,
        retry_count: 0,
        pending_approval_id: None,
        metadata: None,
    }
}
