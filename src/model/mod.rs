//! Persisted data model: workflow definitions, sessions and their execution
//! state, budget pools, approval requests, and LLM audit records.

pub mod approval;
pub mod budget;
pub mod llm_record;
pub mod message_type;
pub mod node;
pub mod session;

pub use approval::{ApprovalContext, ApprovalKind, ApprovalRequest, ApprovalStatus};
pub use budget::{BudgetPool, PoolStatus};
pub use llm_record::{LlmExecutionRecord, TokenUsage, ToolCallLog, ToolInvocation};
pub use message_type::{FieldType, MessageType};
pub use node::{
    CallWorkflowNode, Edge, GeneratorNode, GroupNode, LlmNode, Node, StreamNode, TransformNode,
};
pub use session::{
    ExecutionState, ExecutionStatus, NodeState, NodeStatus, Session, SessionStatus, StoredWorkflow,
};
