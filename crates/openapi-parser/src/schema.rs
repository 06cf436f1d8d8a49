//! Typed schema nodes built from raw decoded spec data

use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Composition keyword of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionKind {
    AllOf,
    OneOf,
    AnyOf,
}

impl CompositionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionKind::AllOf => "allOf",
            CompositionKind::OneOf => "oneOf",
            CompositionKind::AnyOf => "anyOf",
        }
    }
}

/// Primitive JSON Schema types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
}

/// The structural shape of a schema fragment.
///
/// Exactly one shape is chosen per node, in this priority order:
/// `$ref`, `allOf`, `oneOf`, `anyOf`, object, array, scalar.
/// Anything else (including `null` and non-mapping input) is `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaShape {
    /// Pointer to a named component schema
    Reference { target: String },
    /// `allOf` / `oneOf` / `anyOf`
    Composition {
        kind: CompositionKind,
        members: Vec<SchemaNode>,
    },
    /// Object with declared properties
    Object {
        properties: IndexMap<String, SchemaNode>,
        required: BTreeSet<String>,
    },
    /// Array, with the item schema if declared
    Array { items: Option<Box<SchemaNode>> },
    /// Primitive value
    Scalar(ScalarKind),
    /// No recognized shape
    Unknown,
}

/// A schema fragment with its orthogonal facets
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub shape: SchemaShape,
    /// Explicit `example` value
    pub example: Option<Value>,
    /// Declared `enum` values, in order
    pub enumeration: Vec<Value>,
}

impl SchemaNode {
    /// A node with no recognized shape and no facets
    pub fn unknown() -> Self {
        Self {
            shape: SchemaShape::Unknown,
            example: None,
            enumeration: Vec::new(),
        }
    }

    /// Build a node from a raw schema value
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::unknown();
        };

        let example = obj.get("example").cloned();
        let enumeration = obj
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            shape: Self::classify(obj),
            example,
            enumeration,
        }
    }

    fn classify(obj: &serde_json::Map<String, Value>) -> SchemaShape {
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return SchemaShape::Reference {
                target: reference_target(reference).to_string(),
            };
        }

        let compositions = [
            CompositionKind::AllOf,
            CompositionKind::OneOf,
            CompositionKind::AnyOf,
        ];
        for kind in compositions {
            if let Some(members) = obj.get(kind.as_str()).and_then(Value::as_array) {
                return SchemaShape::Composition {
                    kind,
                    members: members.iter().map(Self::from_value).collect(),
                };
            }
        }

        let declared_type = obj.get("type").and_then(Value::as_str);

        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            return SchemaShape::Object {
                properties: properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), Self::from_value(prop)))
                    .collect(),
                required: required_names(obj),
            };
        }

        match declared_type {
            Some("object") => SchemaShape::Object {
                properties: IndexMap::new(),
                required: required_names(obj),
            },
            Some("array") => SchemaShape::Array {
                items: obj
                    .get("items")
                    .filter(|items| !items.is_null())
                    .map(|items| Box::new(Self::from_value(items))),
            },
            Some("string") => SchemaShape::Scalar(ScalarKind::String),
            Some("integer") => SchemaShape::Scalar(ScalarKind::Integer),
            Some("number") => SchemaShape::Scalar(ScalarKind::Number),
            Some("boolean") => SchemaShape::Scalar(ScalarKind::Boolean),
            _ => SchemaShape::Unknown,
        }
    }

    /// Whether this node is a bare `$ref`
    pub fn is_reference(&self) -> bool {
        matches!(self.shape, SchemaShape::Reference { .. })
    }

    /// Whether this node, or anything nested inline in it, must be walked by
    /// the resolver rather than handed to the example generator
    pub fn needs_resolution(&self) -> bool {
        match &self.shape {
            SchemaShape::Reference { .. } | SchemaShape::Composition { .. } => true,
            SchemaShape::Object { properties, .. } => {
                properties.values().any(SchemaNode::needs_resolution)
            }
            SchemaShape::Array { items } => items
                .as_deref()
                .is_some_and(SchemaNode::needs_resolution),
            SchemaShape::Scalar(_) | SchemaShape::Unknown => false,
        }
    }

    /// First declared enum value, if any
    pub fn first_enum_value(&self) -> Option<&Value> {
        self.enumeration.first()
    }
}

impl From<&Value> for SchemaNode {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

/// Extract the schema name from a `$ref` path.
///
/// `#/components/schemas/Pet` and `#/definitions/Pet` both yield `Pet`.
pub fn reference_target(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

fn required_names(obj: &serde_json::Map<String, Value>) -> BTreeSet<String> {
    obj.get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Component schema definitions of a loaded spec.
///
/// Raw definitions are immutable; typed nodes are built on first lookup and
/// shared afterwards. Concurrent first lookups of the same name may both
/// build the node; the last insert wins and both results are identical.
#[derive(Debug, Default)]
pub struct SchemaDefinitions {
    raw: IndexMap<String, Value>,
    nodes: DashMap<String, Arc<SchemaNode>>,
}

impl SchemaDefinitions {
    /// Create a definition table from raw component schemas
    pub fn new(raw: IndexMap<String, Value>) -> Self {
        Self {
            raw,
            nodes: DashMap::new(),
        }
    }

    /// Look up a typed schema node by name
    pub fn get(&self, name: &str) -> Option<Arc<SchemaNode>> {
        if let Some(node) = self.nodes.get(name) {
            return Some(Arc::clone(node.value()));
        }

        let raw = self.raw.get(name)?;
        debug!("Building schema node for {}", name);
        let node = Arc::new(SchemaNode::from_value(raw));
        self.nodes.insert(name.to_string(), Arc::clone(&node));
        Some(node)
    }

    /// Raw (undecoded) schema by name
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw.contains_key(name)
    }

    /// Schema names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl From<IndexMap<String, Value>> for SchemaDefinitions {
    fn from(raw: IndexMap<String, Value>) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_takes_priority() {
        let node = SchemaNode::from_value(&json!({
            "$ref": "#/components/schemas/Pet",
            "allOf": [{"type": "string"}],
            "properties": {"id": {"type": "integer"}}
        }));

        assert_eq!(
            node.shape,
            SchemaShape::Reference {
                target: "Pet".to_string()
            }
        );
    }

    #[test]
    fn test_one_of_wins_over_any_of() {
        let node = SchemaNode::from_value(&json!({
            "anyOf": [{"type": "integer"}],
            "oneOf": [{"type": "string"}, {"type": "boolean"}]
        }));

        match node.shape {
            SchemaShape::Composition { kind, members } => {
                assert_eq!(kind, CompositionKind::OneOf);
                assert_eq!(members.len(), 2);
            }
            other => panic!("expected composition, got {:?}", other),
        }
    }

    #[test]
    fn test_properties_imply_object() {
        let node = SchemaNode::from_value(&json!({
            "required": ["id"],
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
        }));

        match node.shape {
            SchemaShape::Object {
                properties,
                required,
            } => {
                assert_eq!(properties.len(), 2);
                assert!(required.contains("id"));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_needs_resolution_sees_nested_references() {
        let tags = SchemaNode::from_value(&json!({
            "type": "array",
            "items": {"$ref": "#/components/schemas/Tag"}
        }));
        assert!(tags.needs_resolution());

        let owner = SchemaNode::from_value(&json!({
            "properties": {"tag": {"$ref": "#/components/schemas/Tag"}}
        }));
        assert!(owner.needs_resolution());

        let plain = SchemaNode::from_value(&json!({
            "properties": {"names": {"type": "array", "items": {"type": "string"}}}
        }));
        assert!(!plain.needs_resolution());
    }

    #[test]
    fn test_malformed_input_is_unknown() {
        assert_eq!(SchemaNode::from_value(&Value::Null).shape, SchemaShape::Unknown);
        assert_eq!(SchemaNode::from_value(&json!([1, 2])).shape, SchemaShape::Unknown);
        assert_eq!(SchemaNode::from_value(&json!({"$ref": 7})).shape, SchemaShape::Unknown);
        assert_eq!(SchemaNode::from_value(&json!({"allOf": "nope"})).shape, SchemaShape::Unknown);
    }

    #[test]
    fn test_facets_are_kept() {
        let node = SchemaNode::from_value(&json!({
            "type": "string",
            "enum": ["available", "sold"],
            "example": "pending"
        }));

        assert_eq!(node.shape, SchemaShape::Scalar(ScalarKind::String));
        assert_eq!(node.first_enum_value(), Some(&json!("available")));
        assert_eq!(node.example, Some(json!("pending")));
    }

    #[test]
    fn test_reference_target() {
        assert_eq!(reference_target("#/components/schemas/Pet"), "Pet");
        assert_eq!(reference_target("#/definitions/Order"), "Order");
        assert_eq!(reference_target("Tag"), "Tag");
    }

    #[test]
    fn test_definitions_build_lazily() {
        let mut raw = IndexMap::new();
        raw.insert("Tag".to_string(), json!({"properties": {"name": {"type": "string"}}}));
        let definitions = SchemaDefinitions::new(raw);

        assert!(definitions.nodes.is_empty());
        let first = definitions.get("Tag").unwrap();
        let second = definitions.get("Tag").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(definitions.get("Missing").is_none());
    }
}
