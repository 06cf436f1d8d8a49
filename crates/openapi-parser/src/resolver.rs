//! Depth-bounded `$ref` resolver that turns schemas into example trees

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::example::{ExampleGenerator, EXAMPLE_ARRAY_LEN};
use crate::schema::{CompositionKind, SchemaDefinitions, SchemaNode, SchemaShape};

/// Default bound on resolution depth
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// What to produce for a `$ref` whose target is not defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRefPolicy {
    /// An empty object
    #[default]
    Empty,
    /// `{"error": "Unresolved reference: <name>"}`, for debugging specs
    Marker,
}

/// Resolver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum depth; deeper nodes resolve to an empty object
    pub max_depth: usize,
    pub missing_ref: MissingRefPolicy,
    /// Memoize reference targets by (name, depth)
    pub cache: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            missing_ref: MissingRefPolicy::Empty,
            cache: false,
        }
    }
}

/// Resolves schemas against component definitions, producing example trees.
///
/// Every leaf of the output is a literal, never a type descriptor. The walk
/// never fails: missing targets, exhausted depth and unrecognized shapes all
/// degrade to an empty object (or `null` from the example generator).
///
/// Depth counts reference hops: it grows by one each time a `$ref` is
/// followed and is checked before any work at each node. Inline nesting
/// does not count, since it cannot form a cycle.
pub struct SchemaResolver<'a> {
    definitions: &'a SchemaDefinitions,
    examples: &'a ExampleGenerator,
    config: ResolverConfig,
    cache: DashMap<(String, usize), Value>,
}

impl<'a> SchemaResolver<'a> {
    /// Create a resolver with default configuration
    pub fn new(definitions: &'a SchemaDefinitions, examples: &'a ExampleGenerator) -> Self {
        Self::with_config(definitions, examples, ResolverConfig::default())
    }

    pub fn with_config(
        definitions: &'a SchemaDefinitions,
        examples: &'a ExampleGenerator,
        config: ResolverConfig,
    ) -> Self {
        Self {
            definitions,
            examples,
            config,
            cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a component schema by name
    pub fn resolve_named(&self, name: &str) -> Value {
        match self.definitions.get(name) {
            Some(node) => self.resolve_schema(&node, 0),
            None => self.missing(name),
        }
    }

    /// Resolve a raw schema fragment from depth 0
    pub fn resolve(&self, schema: &Value) -> Value {
        self.resolve_schema(&SchemaNode::from_value(schema), 0)
    }

    /// Resolve a schema node at the given depth
    pub fn resolve_schema(&self, node: &SchemaNode, depth: usize) -> Value {
        if depth > self.config.max_depth {
            trace!("Depth bound {} reached, truncating", self.config.max_depth);
            return empty();
        }

        match &node.shape {
            SchemaShape::Reference { target } => self.resolve_reference(target, depth + 1),
            SchemaShape::Composition {
                kind: CompositionKind::AllOf,
                members,
            } => self.merge_all_of(members, depth),
            SchemaShape::Composition { members, .. } => match members.first() {
                Some(first) => self.resolve_member(first, depth),
                None => empty(),
            },
            SchemaShape::Object { properties, .. } => Value::Object(
                properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), self.resolve_property(prop, depth)))
                    .collect(),
            ),
            SchemaShape::Array { .. } | SchemaShape::Scalar(_) | SchemaShape::Unknown => empty(),
        }
    }

    /// Extract an example for a node without following references
    pub fn extract_example(&self, node: &SchemaNode) -> Value {
        self.examples.extract(node)
    }

    fn resolve_reference(&self, target: &str, depth: usize) -> Value {
        if depth > self.config.max_depth {
            return empty();
        }

        let Some(node) = self.definitions.get(target) else {
            debug!("Unresolved reference: {}", target);
            return self.missing(target);
        };

        if !self.config.cache {
            return self.resolve_schema(&node, depth);
        }

        let key = (target.to_string(), depth);
        if let Some(hit) = self.cache.get(&key) {
            return hit.value().clone();
        }
        // Racing resolutions compute the same value; the last insert wins.
        let resolved = self.resolve_schema(&node, depth);
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn merge_all_of(&self, members: &[SchemaNode], depth: usize) -> Value {
        let merged = members
            .iter()
            .map(|member| self.resolve_member(member, depth))
            .fold(Map::new(), |acc, part| match part {
                Value::Object(part) => acc.into_iter().chain(part).collect(),
                _ => acc,
            });
        Value::Object(merged)
    }

    /// Members that need the definition table are resolved; plain inline
    /// fragments go straight to the example generator.
    fn resolve_member(&self, member: &SchemaNode, depth: usize) -> Value {
        if member.needs_resolution() {
            self.resolve_schema(member, depth)
        } else {
            self.examples.extract(member)
        }
    }

    fn resolve_property(&self, prop: &SchemaNode, depth: usize) -> Value {
        if prop.is_reference() {
            return self.resolve_schema(prop, depth);
        }
        if let Some(first) = prop.first_enum_value() {
            return first.clone();
        }
        if let Some(example) = &prop.example {
            return example.clone();
        }
        if !prop.needs_resolution() {
            return self.examples.extract(prop);
        }

        match &prop.shape {
            SchemaShape::Array { items: Some(items) } => Value::Array(
                (0..EXAMPLE_ARRAY_LEN)
                    .map(|_| self.resolve_property(items, depth))
                    .collect(),
            ),
            _ => self.resolve_schema(prop, depth),
        }
    }

    fn missing(&self, name: &str) -> Value {
        match self.config.missing_ref {
            MissingRefPolicy::Empty => empty(),
            MissingRefPolicy::Marker => {
                serde_json::json!({ "error": format!("Unresolved reference: {}", name) })
            }
        }
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn definitions(entries: Vec<(&str, Value)>) -> SchemaDefinitions {
        let raw: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema))
            .collect();
        SchemaDefinitions::new(raw)
    }

    fn max_nesting(value: &Value, key: &str) -> usize {
        match value.get(key) {
            Some(child) => 1 + max_nesting(child, key),
            None => 0,
        }
    }

    #[test]
    fn test_missing_schema_is_empty() {
        let defs = definitions(vec![]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        assert_eq!(resolver.resolve_named("Nope"), json!({}));
        assert_eq!(
            resolver.resolve(&json!({"$ref": "#/components/schemas/Nope"})),
            json!({})
        );
    }

    #[test]
    fn test_missing_schema_marker_policy() {
        let defs = definitions(vec![]);
        let examples = ExampleGenerator::fixed();
        let config = ResolverConfig {
            missing_ref: MissingRefPolicy::Marker,
            ..ResolverConfig::default()
        };
        let resolver = SchemaResolver::with_config(&defs, &examples, config);

        assert_eq!(
            resolver.resolve_named("Ghost"),
            json!({"error": "Unresolved reference: Ghost"})
        );
    }

    #[test]
    fn test_nested_reference_resolves_fully() {
        let defs = definitions(vec![
            (
                "Pet",
                json!({"properties": {
                    "id": {"type": "integer"},
                    "tag": {"$ref": "#/components/schemas/Tag"}
                }}),
            ),
            ("Tag", json!({"properties": {"name": {"type": "string"}}})),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let pet = resolver.resolve_named("Pet");
        assert!(pet["id"].is_i64());
        assert!(pet["tag"]["name"].is_string());
        assert_eq!(pet, json!({"id": 1, "tag": {"name": "string"}}));
    }

    #[test]
    fn test_all_of_last_write_wins() {
        let defs = definitions(vec![
            ("A", json!({"properties": {"a": {"type": "integer", "example": 1}}})),
            (
                "B",
                json!({"properties": {
                    "a": {"type": "integer", "example": 2},
                    "b": {"type": "integer", "example": 3}
                }}),
            ),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let merged = resolver.resolve(&json!({
            "allOf": [
                {"$ref": "#/components/schemas/A"},
                {"$ref": "#/components/schemas/B"}
            ]
        }));
        assert_eq!(merged, json!({"a": 2, "b": 3}));
    }

    #[test]
    fn test_all_of_with_inline_member() {
        let defs = definitions(vec![(
            "Base",
            json!({"properties": {"id": {"type": "integer"}}}),
        )]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let merged = resolver.resolve(&json!({
            "allOf": [
                {"$ref": "#/components/schemas/Base"},
                {"properties": {"name": {"type": "string"}}}
            ]
        }));
        assert_eq!(merged, json!({"id": 1, "name": "string"}));
    }

    #[test]
    fn test_one_of_picks_first_member() {
        let defs = definitions(vec![
            ("Cat", json!({"properties": {"meow": {"type": "boolean"}}})),
            ("Dog", json!({"properties": {"bark": {"type": "boolean"}}})),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let value = resolver.resolve(&json!({"oneOf": [
            {"$ref": "#/components/schemas/Cat"},
            {"$ref": "#/components/schemas/Dog"}
        ]}));
        assert_eq!(value, json!({"meow": true}));

        let value = resolver.resolve(&json!({"anyOf": [
            {"type": "string"},
            {"$ref": "#/components/schemas/Dog"}
        ]}));
        assert_eq!(value, json!("string"));
    }

    #[test]
    fn test_one_of_unresolvable_first_member() {
        let defs = definitions(vec![(
            "Dog",
            json!({"properties": {"bark": {"type": "boolean"}}}),
        )]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let value = resolver.resolve(&json!({"oneOf": [
            {"$ref": "#/components/schemas/Missing"},
            {"$ref": "#/components/schemas/Dog"}
        ]}));
        assert_eq!(value, json!({}));

        assert_eq!(resolver.resolve(&json!({"oneOf": []})), json!({}));
    }

    #[test]
    fn test_enum_picks_first_value() {
        let defs = definitions(vec![(
            "Order",
            json!({"properties": {
                "status": {"type": "string", "enum": ["placed", "approved", "delivered"]},
                "priority": {"enum": [3, 1, 2]}
            }}),
        )]);
        let examples = ExampleGenerator::new(crate::example::ExampleMode::Seeded(9));
        let resolver = SchemaResolver::new(&defs, &examples);

        let order = resolver.resolve_named("Order");
        assert_eq!(order["status"], json!("placed"));
        assert_eq!(order["priority"], json!(3));
    }

    #[test]
    fn test_self_reference_terminates() {
        let defs = definitions(vec![(
            "Self",
            json!({"properties": {
                "name": {"type": "string"},
                "child": {"$ref": "#/components/schemas/Self"}
            }}),
        )]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        // One level per followed reference, plus the truncated `{}`
        let value = resolver.resolve_named("Self");
        assert_eq!(max_nesting(&value, "child"), DEFAULT_MAX_DEPTH + 1);

        let mut deepest = &value;
        while let Some(child) = deepest.get("child") {
            deepest = child;
        }
        assert_eq!(deepest, &json!({}));
    }

    #[test]
    fn test_acyclic_chain_within_bound_resolves_fully() {
        // L0.next -> L1 ... L9.next -> L10 { leaf }
        let mut entries: Vec<(String, Value)> = (0..DEFAULT_MAX_DEPTH)
            .map(|i| {
                let next = format!("#/components/schemas/L{}", i + 1);
                (format!("L{}", i), json!({"properties": {"next": {"$ref": next}}}))
            })
            .collect();
        entries.push((
            format!("L{}", DEFAULT_MAX_DEPTH),
            json!({"properties": {"leaf": {"type": "string"}}}),
        ));
        let defs = SchemaDefinitions::new(entries.into_iter().collect());
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let value = resolver.resolve_named("L0");
        assert_eq!(max_nesting(&value, "next"), DEFAULT_MAX_DEPTH);

        let mut deepest = &value;
        while let Some(next) = deepest.get("next") {
            deepest = next;
        }
        assert_eq!(deepest, &json!({"leaf": "string"}));
    }

    #[test]
    fn test_array_and_inline_object_properties_follow_references() {
        let defs = definitions(vec![
            (
                "Pet",
                json!({"properties": {
                    "name": {"type": "string", "example": "doggie"},
                    "photoUrls": {"type": "array", "items": {"type": "string"}},
                    "tags": {"type": "array", "items": {"$ref": "#/components/schemas/Tag"}},
                    "owner": {
                        "type": "object",
                        "properties": {"tag": {"$ref": "#/components/schemas/Tag"}}
                    }
                }}),
            ),
            (
                "Tag",
                json!({"properties": {"id": {"type": "integer"}, "name": {"type": "string"}}}),
            ),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let tag = json!({"id": 1, "name": "string"});
        assert_eq!(
            resolver.resolve_named("Pet"),
            json!({
                "name": "doggie",
                "photoUrls": ["string", "string"],
                "tags": [tag, tag],
                "owner": {"tag": tag}
            })
        );
    }

    #[test]
    fn test_mutual_cycle_terminates() {
        let defs = definitions(vec![
            ("A", json!({"properties": {"b": {"$ref": "#/components/schemas/B"}}})),
            ("B", json!({"allOf": [{"$ref": "#/components/schemas/A"}]})),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        let value = resolver.resolve_named("A");
        assert!(value.is_object());
    }

    #[test]
    fn test_bare_reference_cycle_terminates() {
        let defs = definitions(vec![
            ("A", json!({"$ref": "#/components/schemas/B"})),
            ("B", json!({"$ref": "#/components/schemas/A"})),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        assert_eq!(resolver.resolve_named("A"), json!({}));
    }

    #[test]
    fn test_max_depth_is_configurable() {
        let defs = definitions(vec![(
            "Node",
            json!({"properties": {"next": {"$ref": "#/components/schemas/Node"}}}),
        )]);
        let examples = ExampleGenerator::fixed();

        let shallow = SchemaResolver::with_config(
            &defs,
            &examples,
            ResolverConfig {
                max_depth: 2,
                ..ResolverConfig::default()
            },
        );
        let deep = SchemaResolver::new(&defs, &examples);

        let shallow_depth = max_nesting(&shallow.resolve_named("Node"), "next");
        let deep_depth = max_nesting(&deep.resolve_named("Node"), "next");
        assert!(shallow_depth < deep_depth);
    }

    #[test]
    fn test_non_object_shapes_resolve_empty() {
        let defs = definitions(vec![]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::new(&defs, &examples);

        assert_eq!(resolver.resolve(&json!({"type": "string"})), json!({}));
        assert_eq!(resolver.resolve(&json!({"type": "array", "items": {}})), json!({}));
        assert_eq!(resolver.resolve(&Value::Null), json!({}));
    }

    #[test]
    fn test_cached_resolution_matches_uncached() {
        let defs = definitions(vec![
            (
                "Pet",
                json!({"properties": {
                    "id": {"type": "integer"},
                    "tag": {"$ref": "#/components/schemas/Tag"},
                    "other": {"$ref": "#/components/schemas/Tag"}
                }}),
            ),
            ("Tag", json!({"properties": {"name": {"type": "string"}}})),
        ]);
        let examples = ExampleGenerator::fixed();
        let plain = SchemaResolver::new(&defs, &examples);
        let cached = SchemaResolver::with_config(
            &defs,
            &examples,
            ResolverConfig {
                cache: true,
                ..ResolverConfig::default()
            },
        );

        assert_eq!(plain.resolve_named("Pet"), cached.resolve_named("Pet"));
        assert_eq!(plain.resolve_named("Pet"), cached.resolve_named("Pet"));
    }

    #[test]
    fn test_concurrent_resolution() {
        let defs = definitions(vec![
            ("Pet", json!({"properties": {"tag": {"$ref": "#/components/schemas/Tag"}}})),
            ("Tag", json!({"properties": {"name": {"type": "string"}}})),
        ]);
        let examples = ExampleGenerator::fixed();
        let resolver = SchemaResolver::with_config(
            &defs,
            &examples,
            ResolverConfig {
                cache: true,
                ..ResolverConfig::default()
            },
        );

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| resolver.resolve_named("Pet")))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), json!({"tag": {"name": "string"}}));
            }
        });
    }
}
