use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::message_type::MessageType;
use crate::transform::TransformExpr;

/// A node in a workflow definition tree.
///
/// The tree is rooted at a [`Node::Group`]; groups nest arbitrarily.
/// `Stream` and `Generator` are part of the model but the executor reports
/// them as unimplemented.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Group(GroupNode),
    Llm(LlmNode),
    Transform(TransformNode),
    CallWorkflow(CallWorkflowNode),
    Stream(StreamNode),
    Generator(GeneratorNode),
}

impl Node {
    /// Short name of the node kind, used in state rows and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Group(_) => "group",
            Node::Llm(_) => "llm",
            Node::Transform(_) => "transform",
            Node::CallWorkflow(_) => "call_workflow",
            Node::Stream(_) => "stream",
            Node::Generator(_) => "generator",
        }
    }
}

/// A subgraph with entry/exit sentinels delimiting traversal.
///
/// `entry_point` and `exit_point` are not members of `nodes`; an edge leaving
/// the entry carries the group's input, and an edge arriving at the exit
/// yields the group's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupNode {
    #[serde(default)]
    pub label: String,
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    pub entry_point: String,
    pub exit_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub input_type: MessageType,
    #[serde(default)]
    pub output_type: MessageType,
}

/// A single LLM call. Tools are referenced by name and resolved against the
/// application's tool registry at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmNode {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewers: Option<Vec<String>>,
    #[serde(default)]
    pub requires_human_review: bool,
    #[serde(default)]
    pub input_type: MessageType,
    #[serde(default)]
    pub output_type: MessageType,
}

/// A pure data reshaping step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformNode {
    #[serde(rename = "fn")]
    pub expr: TransformExpr,
    #[serde(default)]
    pub input_type: MessageType,
    #[serde(default)]
    pub output_type: MessageType,
}

/// Invocation of another stored workflow as a nested run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallWorkflowNode {
    pub workflow_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mapping: Option<TransformExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_mapping: Option<TransformExpr>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub input_type: MessageType,
    #[serde(default)]
    pub output_type: MessageType,
}

/// Declared but unimplemented. The executor fails with a distinguished error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamNode {
    #[serde(default)]
    pub input_type: MessageType,
    #[serde(default)]
    pub output_type: MessageType,
}

/// Declared but unimplemented. The executor fails with a distinguished error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorNode {
    #[serde(default)]
    pub input_type: MessageType,
    #[serde(default)]
    pub output_type: MessageType,
}

/// A directed edge inside a group.
///
/// `output_field`, when set, projects that field out of the producer's
/// record-shaped output before handing it on; `input_field`, when set, wraps
/// the projected value as `{ input_field: value }` for the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_field: Option<String>,
    #[serde(default)]
    pub description: String,
}
