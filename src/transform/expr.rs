use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transform expression: a small declarative language for reshaping
/// JSON-like values.
///
/// Used by transform nodes and by the input/output mappings of
/// `call_workflow` nodes. Evaluation is pure; see [`super::eval`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformExpr {
    /// A literal value.
    Const { value: Value },
    /// The value at `base_path ++ path`; missing fields yield null.
    Get {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<String>,
    },
    /// Evaluate `fn` with the base path extended by `path`.
    With {
        path: Vec<String>,
        #[serde(rename = "fn")]
        body: Box<TransformExpr>,
    },
    /// Dispatch on the tag (or string form) of the value at the path.
    If {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<String>,
        branches: BTreeMap<String, TransformExpr>,
    },
    /// Apply `fn` to each element of the array at the path; the element is
    /// exposed to the body under the `item` field.
    Map {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<String>,
        #[serde(rename = "fn")]
        body: Box<TransformExpr>,
    },
    /// Build a record, evaluating each field independently.
    Object { fields: BTreeMap<String, TransformExpr> },
    /// Build a record with a literal `tag` field plus evaluated fields.
    TaggedUnion {
        tag: String,
        fields: BTreeMap<String, TransformExpr>,
    },
}
