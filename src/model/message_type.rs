use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recursive value-type algebra for node message shapes.
///
/// Workflows may declare named `typedefs`; a [`MessageType::Ref`] points at
/// one of them and is resolved with [`MessageType::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    String,
    Enum { values: Vec<String> },
    Array { of: Box<MessageType> },
    Optional { of: Box<MessageType> },
    Object { fields: BTreeMap<String, FieldType> },
    TaggedUnion { variants: BTreeMap<String, FieldType> },
    Ref { name: String },
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::String
    }
}

/// A described field inside an object or tagged-union type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub ty: Box<MessageType>,
}

/// Reference resolution depth guard. Typedef chains deeper than this are
/// treated as cyclic.
const MAX_REF_DEPTH: usize = 32;

impl MessageType {
    /// Resolve `Ref` indirections against a workflow's typedefs.
    ///
    /// Returns the first non-`Ref` type reached, or an error naming the
    /// unresolved or cyclic reference.
    pub fn resolve<'a>(
        &'a self,
        typedefs: &'a BTreeMap<String, MessageType>,
    ) -> Result<&'a MessageType, String> {
        let mut current = self;
        for _ in 0..MAX_REF_DEPTH {
            match current {
                MessageType::Ref { name } => {
                    current = typedefs
                        .get(name)
                        .ok_or_else(|| format!("unresolved typedef '{}'", name))?;
                }
                other => return Ok(other),
            }
        }
        Err("typedef reference chain too deep (cycle?)".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_serde_roundtrip() {
        let ty = MessageType::Object {
            fields: BTreeMap::from([(
                "name".to_string(),
                FieldType {
                    description: "the name".to_string(),
                    ty: Box::new(MessageType::String),
                },
            )]),
        };
        let value = serde_json::to_value(&ty).unwrap();
        assert_eq!(value["type"], "object");
        let back: MessageType = serde_json::from_value(value).unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn test_message_type_tagged_union_deserialize() {
        let ty: MessageType = serde_json::from_value(json!({
            "type": "tagged_union",
            "variants": {
                "ok": { "description": "success", "type": { "type": "string" } },
                "err": { "description": "failure", "type": { "type": "string" } }
            }
        }))
        .unwrap();
        match ty {
            MessageType::TaggedUnion { variants } => {
                assert_eq!(variants.len(), 2);
            }
            other => panic!("expected tagged union, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_ref() {
        let typedefs = BTreeMap::from([
            ("a".to_string(), MessageType::Ref { name: "b".into() }),
            (
                "b".to_string(),
                MessageType::Enum {
                    values: vec!["x".into()],
                },
            ),
        ]);
        let ty = MessageType::Ref { name: "a".into() };
        let resolved = ty.resolve(&typedefs).unwrap();
        assert!(matches!(resolved, MessageType::Enum { .. }));
    }

    #[test]
    fn test_resolve_unknown_ref() {
        let typedefs = BTreeMap::new();
        let ty = MessageType::Ref {
            name: "missing".into(),
        };
        assert!(ty.resolve(&typedefs).is_err());
    }

    #[test]
    fn test_resolve_cyclic_ref() {
        let typedefs = BTreeMap::from([
            ("a".to_string(), MessageType::Ref { name: "b".into() }),
            ("b".to_string(), MessageType::Ref { name: "a".into() }),
        ]);
        let ty = MessageType::Ref { name: "a".into() };
        assert!(ty.resolve(&typedefs).is_err());
    }
}
