use serde_json::{Map, Value};

use super::error::value_kind;
use super::{TransformError, TransformExpr};

/// Field name under which `map` exposes the current element to its body.
const ITEM_FIELD: &str = "item";

/// Evaluate `expr` against `data`, scoped at `base_path`.
///
/// Pure and deterministic: identical `(expr, data, base_path)` always
/// produces an identical value. Missing fields resolve to null; only `if`
/// without a matching branch and `map` over a non-array fail.
pub fn eval(
    expr: &TransformExpr,
    data: &Value,
    base_path: &[String],
) -> Result<Value, TransformError> {
    match expr {
        TransformExpr::Const { value } => Ok(value.clone()),
        TransformExpr::Get { path } => {
            Ok(lookup(data, base_path, path).cloned().unwrap_or(Value::Null))
        }
        TransformExpr::With { path, body } => {
            let scoped = join_path(base_path, path);
            eval(body, data, &scoped)
        }
        TransformExpr::If { path, branches } => {
            let value = lookup(data, base_path, path).cloned().unwrap_or(Value::Null);
            let tag = dispatch_tag(&value);
            let branch = branches
                .get(&tag)
                .ok_or(TransformError::NoMatchingBranch { tag })?;
            eval(branch, data, base_path)
        }
        TransformExpr::Map { path, body } => {
            let value = lookup(data, base_path, path).cloned().unwrap_or(Value::Null);
            let items = match value {
                Value::Array(items) => items,
                other => {
                    return Err(TransformError::TypeMismatch {
                        path: display_path(base_path, path),
                        expected: "array",
                        found: value_kind(&other),
                    });
                }
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let scoped_data = overlay_item(data, item);
                out.push(eval(body, &scoped_data, base_path)?);
            }
            Ok(Value::Array(out))
        }
        TransformExpr::Object { fields } => {
            let mut out = Map::new();
            for (name, field_expr) in fields {
                out.insert(name.clone(), eval(field_expr, data, base_path)?);
            }
            Ok(Value::Object(out))
        }
        TransformExpr::TaggedUnion { tag, fields } => {
            let mut out = Map::new();
            out.insert("tag".to_string(), Value::String(tag.clone()));
            for (name, field_expr) in fields {
                out.insert(name.clone(), eval(field_expr, data, base_path)?);
            }
            Ok(Value::Object(out))
        }
    }
}

/// Walk `base_path ++ path` through nested objects. Any miss yields `None`.
fn lookup<'a>(data: &'a Value, base_path: &[String], path: &[String]) -> Option<&'a Value> {
    let mut current = data;
    for segment in base_path.iter().chain(path.iter()) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Dispatch key for `if`: an object's `tag` field when present, otherwise
/// the string form of the value. A non-string `tag` still dispatches, on
/// its own string form.
fn dispatch_tag(value: &Value) -> String {
    let keyed = match value.as_object().and_then(|o| o.get("tag")) {
        Some(tag) => tag,
        None => value,
    };
    match keyed {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `data` with `{ item: element }` overlaid at the root.
fn overlay_item(data: &Value, item: Value) -> Value {
    let mut map = match data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    map.insert(ITEM_FIELD.to_string(), item);
    Value::Object(map)
}

fn join_path(base_path: &[String], path: &[String]) -> Vec<String> {
    base_path.iter().chain(path.iter()).cloned().collect()
}

fn display_path(base_path: &[String], path: &[String]) -> String {
    let joined = join_path(base_path, path);
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expr(value: serde_json::Value) -> TransformExpr {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_const() {
        let e = expr(json!({ "type": "const", "value": { "a": 1 } }));
        assert_eq!(eval(&e, &json!({}), &[]).unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn test_get_whole_input() {
        let e = expr(json!({ "type": "get" }));
        let data = json!({ "x": [1, 2] });
        assert_eq!(eval(&e, &data, &[]).unwrap(), data);
    }

    #[test]
    fn test_get_nested_path() {
        let e = expr(json!({ "type": "get", "path": ["a", "b"] }));
        let data = json!({ "a": { "b": 42 } });
        assert_eq!(eval(&e, &data, &[]).unwrap(), json!(42));
    }

    #[test]
    fn test_get_missing_yields_null() {
        let e = expr(json!({ "type": "get", "path": ["a", "missing", "deep"] }));
        let data = json!({ "a": { "b": 1 } });
        assert_eq!(eval(&e, &data, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_get_through_non_object_yields_null() {
        let e = expr(json!({ "type": "get", "path": ["a", "b"] }));
        let data = json!({ "a": 7 });
        assert_eq!(eval(&e, &data, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_with_scopes_base_path() {
        let e = expr(json!({
            "type": "with",
            "path": ["outer"],
            "fn": { "type": "get", "path": ["inner"] }
        }));
        let data = json!({ "outer": { "inner": "v" } });
        assert_eq!(eval(&e, &data, &[]).unwrap(), json!("v"));
    }

    #[test]
    fn test_if_dispatches_on_tag_field() {
        let e = expr(json!({
            "type": "if",
            "path": ["result"],
            "branches": {
                "ok": { "type": "const", "value": "succeeded" },
                "err": { "type": "const", "value": "failed" }
            }
        }));
        let data = json!({ "result": { "tag": "err", "message": "boom" } });
        assert_eq!(eval(&e, &data, &[]).unwrap(), json!("failed"));
    }

    #[test]
    fn test_if_dispatches_on_non_string_tag() {
        let e = expr(json!({
            "type": "if",
            "path": ["result"],
            "branches": {
                "5": { "type": "const", "value": "five" },
                "other": { "type": "const", "value": "not five" }
            }
        }));
        let data = json!({ "result": { "tag": 5, "other": "x" } });
        assert_eq!(eval(&e, &data, &[]).unwrap(), json!("five"));
    }

    #[test]
    fn test_if_dispatches_on_string_form() {
        let e = expr(json!({
            "type": "if",
            "path": ["flag"],
            "branches": {
                "true": { "type": "const", "value": 1 },
                "false": { "type": "const", "value": 0 }
            }
        }));
        assert_eq!(eval(&e, &json!({ "flag": true }), &[]).unwrap(), json!(1));
        assert_eq!(eval(&e, &json!({ "flag": false }), &[]).unwrap(), json!(0));
    }

    #[test]
    fn test_if_no_matching_branch() {
        let e = expr(json!({
            "type": "if",
            "branches": { "a": { "type": "const", "value": 1 } }
        }));
        let err = eval(&e, &json!("b"), &[]).unwrap_err();
        assert!(matches!(err, TransformError::NoMatchingBranch { tag } if tag == "b"));
    }

    #[test]
    fn test_map_over_array() {
        let e = expr(json!({
            "type": "map",
            "path": ["xs"],
            "fn": { "type": "get", "path": ["item", "name"] }
        }));
        let data = json!({ "xs": [{ "name": "a" }, { "name": "b" }] });
        assert_eq!(eval(&e, &data, &[]).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_map_item_overlays_existing_data() {
        // The body can still see the rest of the input next to `item`.
        let e = expr(json!({
            "type": "map",
            "path": ["xs"],
            "fn": {
                "type": "object",
                "fields": {
                    "x": { "type": "get", "path": ["item"] },
                    "label": { "type": "get", "path": ["label"] }
                }
            }
        }));
        let data = json!({ "xs": [1, 2], "label": "L" });
        assert_eq!(
            eval(&e, &data, &[]).unwrap(),
            json!([{ "x": 1, "label": "L" }, { "x": 2, "label": "L" }])
        );
    }

    #[test]
    fn test_map_on_non_array_fails() {
        let e = expr(json!({
            "type": "map",
            "path": ["xs"],
            "fn": { "type": "get" }
        }));
        let err = eval(&e, &json!({ "xs": "nope" }), &[]).unwrap_err();
        match err {
            TransformError::TypeMismatch {
                path,
                expected,
                found,
            } => {
                assert_eq!(path, "xs");
                assert_eq!(expected, "array");
                assert_eq!(found, "string");
            }
            other => panic!("expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_object_construction() {
        let e = expr(json!({
            "type": "object",
            "fields": {
                "greeting": { "type": "const", "value": "hi" },
                "name": { "type": "get", "path": ["who"] }
            }
        }));
        let data = json!({ "who": "Ada" });
        assert_eq!(
            eval(&e, &data, &[]).unwrap(),
            json!({ "greeting": "hi", "name": "Ada" })
        );
    }

    #[test]
    fn test_tagged_union_construction() {
        let e = expr(json!({
            "type": "tagged_union",
            "tag": "ok",
            "fields": { "value": { "type": "get", "path": ["v"] } }
        }));
        assert_eq!(
            eval(&e, &json!({ "v": 3 }), &[]).unwrap(),
            json!({ "tag": "ok", "value": 3 })
        );
    }

    #[test]
    fn test_eval_is_deterministic() {
        let e = expr(json!({
            "type": "object",
            "fields": {
                "b": { "type": "get", "path": ["b"] },
                "a": { "type": "get", "path": ["a"] }
            }
        }));
        let data = json!({ "a": 1, "b": [true, null, "s"] });
        let first = serde_json::to_vec(&eval(&e, &data, &[]).unwrap()).unwrap();
        let second = serde_json::to_vec(&eval(&e, &data, &[]).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
