pub mod app;
pub mod budget;
pub mod core;
pub mod error;
pub mod executor;
pub mod llm;
pub mod model;
pub mod runner;
pub mod store;
pub mod tools;
pub mod transform;

pub use crate::app::{NewWorkflow, WorkflowApp, WorkflowAppBuilder};
pub use crate::budget::{BudgetError, BudgetManager, CreatePool};
pub use crate::core::{
    FixedTimeProvider, IdGenerator, RuntimeContext, SequentialIdGenerator, TimeProvider,
};
pub use crate::error::{EngineError, NodeError};
pub use crate::executor::{GraphExecutor, NestedRunOutput, SubWorkflowRunner, ROOT_NODE_ID};
pub use crate::llm::{
    GenerateTextRequest, GenerateTextResponse, LlmError, LlmProvider,
};
pub use crate::model::{
    ApprovalContext, ApprovalKind, ApprovalRequest, ApprovalStatus, BudgetPool, Edge,
    ExecutionState, ExecutionStatus, MessageType, Node, NodeState, NodeStatus, PoolStatus,
    Session, SessionStatus, StoredWorkflow, TokenUsage,
};
pub use crate::runner::{ExecuteOptions, RunConfig, RunController, RunOutcome};
pub use crate::store::{InMemoryStore, ListOptions, StoreError, WorkflowStore};
pub use crate::tools::{
    BridgedTool, FieldSpec, ToolCallContext, ToolDefinition, ToolError, ToolHandler, ToolRegistry,
    ToolSchema,
};
pub use crate::transform::{eval, TransformError, TransformExpr};
