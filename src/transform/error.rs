use thiserror::Error;

/// Errors raised while evaluating a transform expression.
///
/// An unknown expression kind never reaches evaluation: expressions only
/// enter the crate as typed [`super::TransformExpr`] values, and serde
/// rejects an unrecognized `type` tag at deserialization time.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no matching branch for tag '{tag}'")]
    NoMatchingBranch { tag: String },
    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Human-readable name of a JSON value's type, for error messages.
pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
