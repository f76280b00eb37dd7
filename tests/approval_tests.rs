//! Suspension and approval protocol: human review, workflow-call gates,
//! budget-increase promotion, rejection, and the composite lifecycle.

mod common;

use std::sync::Arc;

use serde_json::json;

use agentflow::{
    ApprovalContext, ApprovalKind, ApprovalStatus, CreatePool, EngineError, ExecuteOptions,
    NodeStatus, SessionStatus, WorkflowApp,
};
use common::{deterministic_context, workflow, ScriptedProvider};

fn review_workflow() -> serde_json::Value {
    json!({
        "kind": "group",
        "nodes": {
            "llm": { "kind": "llm", "requires_human_review": true }
        },
        "edges": [
            { "from": "entry", "to": "llm" },
            { "from": "llm", "to": "exit" }
        ],
        "entry_point": "entry",
        "exit_point": "exit"
    })
}

#[tokio::test]
async fn test_human_review_suspends_session() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .provider(Arc::new(ScriptedProvider::new("generated")))
        .build();
    app.save_workflow(workflow("wf", review_workflow()))
        .await
        .unwrap();

    let outcome = app
        .execute_workflow("wf", json!("x"), ExecuteOptions::default())
        .await
        .unwrap();

    assert!(!outcome.success);
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    let session = app.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::WaitingForHumanReview);

    // Exactly one pending approval for the waiting session.
    let pending = app
        .list_pending_approvals(Some(ApprovalKind::HumanReview))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, approval_id);
    assert_eq!(pending[0].session_id, outcome.session_id);

    // Review happens before the provider call, so the reviewer sees the
    // node's input.
    match &pending[0].context {
        ApprovalContext::HumanReview { llm_output } => assert_eq!(llm_output, &json!("x")),
        other => panic!("expected human review context, got {:?}", other),
    }

    let state = app
        .get_execution_state(&outcome.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        state.node_states["root.llm"].status,
        NodeStatus::WaitingForReview
    );
    assert_eq!(
        state.node_states["root.llm"].pending_approval_id.as_deref(),
        Some(approval_id.as_str())
    );
}

#[tokio::test]
async fn test_approve_and_resume_completes_run() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .provider(Arc::new(ScriptedProvider::new("generated")))
        .build();
    app.save_workflow(workflow("wf", review_workflow()))
        .await
        .unwrap();

    let outcome = app
        .execute_workflow("wf", json!("x"), ExecuteOptions::default())
        .await
        .unwrap();
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    let approved = app
        .approve_request(&approval_id, "u", Some("ok".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);

    let reloaded = app
        .get_approval_request(&approval_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, ApprovalStatus::Approved);
    assert_eq!(reloaded.resolved_by.as_deref(), Some("u"));
    assert_eq!(reloaded.resolution_notes.as_deref(), Some("ok"));

    let resumed = app
        .resume_session(&outcome.session_id, &approval_id)
        .await
        .unwrap();
    assert!(resumed.success);
    assert_eq!(resumed.output, Some(json!("generated")));

    let session = app.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    let state = app
        .get_execution_state(&outcome.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.node_states["root.llm"].status, NodeStatus::Completed);
    assert_eq!(state.node_states["root"].status, NodeStatus::Completed);
}

#[tokio::test]
async fn test_resume_without_approval_fails() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .provider(Arc::new(ScriptedProvider::new("generated")))
        .build();
    app.save_workflow(workflow("wf", review_workflow()))
        .await
        .unwrap();

    let outcome = app
        .execute_workflow("wf", json!("x"), ExecuteOptions::default())
        .await
        .unwrap();
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    let err = app
        .resume_session(&outcome.session_id, &approval_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotApproved(_)));

    let err = app
        .resume_session(&outcome.session_id, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ApprovalNotFound(_)));
}

#[tokio::test]
async fn test_reject_fails_node_and_session() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .provider(Arc::new(ScriptedProvider::new("generated")))
        .build();
    app.save_workflow(workflow("wf", review_workflow()))
        .await
        .unwrap();

    let outcome = app
        .execute_workflow("wf", json!("x"), ExecuteOptions::default())
        .await
        .unwrap();
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    let rejected = app
        .reject_request(&approval_id, "u", Some("not safe".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);

    let session = app.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);

    let state = app
        .get_execution_state(&outcome.session_id)
        .await
        .unwrap()
        .unwrap();
    let node = &state.node_states["root.llm"];
    assert_eq!(node.status, NodeStatus::Failed);
    assert!(node.error.as_deref().unwrap().contains("review rejected"));

    // A rejected approval cannot be resumed or re-resolved.
    let err = app
        .resume_session(&outcome.session_id, &approval_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotApproved(_)));
    let err = app.approve_request(&approval_id, "u", None).await.unwrap_err();
    assert!(matches!(err, EngineError::ApprovalAlreadyResolved(_)));
}

#[tokio::test]
async fn test_workflow_call_approval_gate() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .build();

    app.save_workflow(workflow(
        "inner",
        json!({
            "kind": "group",
            "nodes": {
                "echo": { "kind": "transform", "fn": { "type": "get" } }
            },
            "edges": [
                { "from": "entry", "to": "echo" },
                { "from": "echo", "to": "exit" }
            ],
            "entry_point": "entry",
            "exit_point": "exit"
        }),
    ))
    .await
    .unwrap();

    app.save_workflow(workflow(
        "outer",
        json!({
            "kind": "group",
            "nodes": {
                "call": {
                    "kind": "call_workflow",
                    "workflow_ref": "inner",
                    "requires_approval": true
                }
            },
            "edges": [
                { "from": "entry", "to": "call" },
                { "from": "call", "to": "exit" }
            ],
            "entry_point": "entry",
            "exit_point": "exit"
        }),
    ))
    .await
    .unwrap();

    let outcome = app
        .execute_workflow("outer", json!({ "n": 5 }), ExecuteOptions::default())
        .await
        .unwrap();
    assert!(!outcome.success);
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    let session = app.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::WaitingForWorkflowApproval);

    let approval = app
        .get_approval_request(&approval_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approval.kind, ApprovalKind::WorkflowCall);
    match &approval.context {
        ApprovalContext::WorkflowCall { workflow_ref } => assert_eq!(workflow_ref, "inner"),
        other => panic!("expected workflow call context, got {:?}", other),
    }

    app.approve_request(&approval_id, "admin", None).await.unwrap();
    let resumed = app
        .resume_session(&outcome.session_id, &approval_id)
        .await
        .unwrap();
    assert!(resumed.success);
    assert_eq!(resumed.output, Some(json!({ "n": 5 })));
}

#[tokio::test]
async fn test_budget_exhaustion_promotes_to_approval() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .provider(Arc::new(ScriptedProvider::with_usage("pricey", 75)))
        .build();
    app.save_workflow(workflow(
        "wf",
        json!({
            "kind": "group",
            "nodes": {
                "llm": { "kind": "llm" }
            },
            "edges": [
                { "from": "entry", "to": "llm" },
                { "from": "llm", "to": "exit" }
            ],
            "entry_point": "entry",
            "exit_point": "exit"
        }),
    ))
    .await
    .unwrap();

    let pool = app
        .budget()
        .create(CreatePool {
            id: Some("pool".to_string()),
            total_budget: 50,
            parent_pool_id: None,
            metadata: None,
        })
        .await
        .unwrap();

    let outcome = app
        .execute_workflow(
            "wf",
            json!("q"),
            ExecuteOptions {
                session_id: None,
                budget_pool_id: Some(pool.id.clone()),
            },
        )
        .await
        .unwrap();
    assert!(!outcome.success);
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    let session = app.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::WaitingForBudgetApproval);

    let approval = app
        .get_approval_request(&approval_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(approval.kind, ApprovalKind::BudgetIncrease);
    match &approval.context {
        ApprovalContext::BudgetIncrease {
            requested_budget,
            current_usage,
        } => {
            assert_eq!(*requested_budget, 75);
            assert_eq!(*current_usage, 0);
        }
        other => panic!("expected budget increase context, got {:?}", other),
    }

    // Approving tops the pool up by the requested amount.
    app.approve_request(&approval_id, "finance", None).await.unwrap();
    let topped_up = app.budget().get("pool").await.unwrap();
    assert_eq!(topped_up.total_budget, 125);

    // Re-entry re-invokes the provider and the consume now passes.
    let resumed = app
        .resume_session(&outcome.session_id, &approval_id)
        .await
        .unwrap();
    assert!(resumed.success);

    let pool = app.budget().get("pool").await.unwrap();
    assert_eq!(pool.used_budget, 75);
    assert_eq!(pool.remaining_budget, 50);
    assert!(pool.is_balanced());
}

#[tokio::test]
async fn test_complete_lifecycle_with_budget_and_review() {
    let app = WorkflowApp::builder()
        .context(deterministic_context())
        .provider(Arc::new(ScriptedProvider::with_usage("done", 75)))
        .build();

    app.save_workflow(workflow(
        "wf",
        json!({
            "kind": "group",
            "nodes": {
                "llm": { "kind": "llm", "requires_human_review": true }
            },
            "edges": [
                { "from": "entry", "to": "llm" },
                { "from": "llm", "to": "exit" }
            ],
            "entry_point": "entry",
            "exit_point": "exit"
        }),
    ))
    .await
    .unwrap();

    let pool = app
        .budget()
        .create(CreatePool {
            id: Some("p".to_string()),
            total_budget: 1000,
            parent_pool_id: None,
            metadata: None,
        })
        .await
        .unwrap();

    let outcome = app
        .execute_workflow(
            "wf",
            json!("draft"),
            ExecuteOptions {
                session_id: None,
                budget_pool_id: Some(pool.id.clone()),
            },
        )
        .await
        .unwrap();
    assert!(!outcome.success);
    let approval_id = outcome.pending_approval_id.clone().unwrap();

    app.approve_request(&approval_id, "reviewer", Some("lgtm".to_string()))
        .await
        .unwrap();
    let resumed = app
        .resume_session(&outcome.session_id, &approval_id)
        .await
        .unwrap();
    assert!(resumed.success);
    assert_eq!(resumed.output, Some(json!("done")));

    let session = app.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    let pool = app.budget().get("p").await.unwrap();
    assert_eq!(pool.used_budget, 75);
    assert_eq!(pool.remaining_budget, 925);
    assert!(pool.is_balanced());

    let records = app
        .store()
        .list_llm_executions_by_session(&outcome.session_id, Default::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].usage.unwrap().total_tokens, 75);
}
