//! Type-directed example value synthesis

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

use crate::schema::{ScalarKind, SchemaNode, SchemaShape};

/// Placeholder string used in fixed mode
pub const FIXED_STRING: &str = "string";
/// Placeholder integer used in fixed mode
pub const FIXED_INTEGER: i64 = 1;
/// Placeholder number used in fixed mode
pub const FIXED_NUMBER: f64 = 1.5;

/// Number of elements synthesized for array schemas
pub(crate) const EXAMPLE_ARRAY_LEN: usize = 2;
/// Length of random strings
const RANDOM_STRING_LEN: usize = 8;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// How scalar placeholders are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExampleMode {
    /// Stable placeholders; booleans are always `true`
    #[default]
    Fixed,
    /// Random values from a seeded generator (reproducible)
    Seeded(u64),
    /// Random values from an entropy-seeded generator
    Random,
}

/// Produces example values from schema nodes.
///
/// Never follows `$ref`; references and compositions yield `null`.
pub struct ExampleGenerator {
    mode: ExampleMode,
    rng: Option<Mutex<StdRng>>,
}

impl ExampleGenerator {
    pub fn new(mode: ExampleMode) -> Self {
        let rng = match mode {
            ExampleMode::Fixed => None,
            ExampleMode::Seeded(seed) => Some(Mutex::new(StdRng::seed_from_u64(seed))),
            ExampleMode::Random => Some(Mutex::new(StdRng::from_entropy())),
        };

        Self { mode, rng }
    }

    /// Generator with stable placeholders
    pub fn fixed() -> Self {
        Self::new(ExampleMode::Fixed)
    }

    pub fn mode(&self) -> ExampleMode {
        self.mode
    }

    /// Extract an example value for a schema node
    pub fn extract(&self, node: &SchemaNode) -> Value {
        if let Some(example) = &node.example {
            return example.clone();
        }

        match &node.shape {
            SchemaShape::Scalar(kind) => self.scalar(*kind),
            SchemaShape::Array { items } => match items {
                Some(items) => Value::Array((0..EXAMPLE_ARRAY_LEN).map(|_| self.extract(items)).collect()),
                None => Value::Array(Vec::new()),
            },
            SchemaShape::Object { properties, .. } => Value::Object(
                properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), self.extract(prop)))
                    .collect::<Map<String, Value>>(),
            ),
            SchemaShape::Reference { .. }
            | SchemaShape::Composition { .. }
            | SchemaShape::Unknown => Value::Null,
        }
    }

    /// Extract an example value straight from a raw schema value
    pub fn extract_value(&self, schema: &Value) -> Value {
        self.extract(&SchemaNode::from_value(schema))
    }

    fn scalar(&self, kind: ScalarKind) -> Value {
        let Some(rng) = &self.rng else {
            return match kind {
                ScalarKind::String => Value::from(FIXED_STRING),
                ScalarKind::Integer => Value::from(FIXED_INTEGER),
                ScalarKind::Number => Value::from(FIXED_NUMBER),
                ScalarKind::Boolean => Value::Bool(true),
            };
        };

        let mut rng = rng.lock();
        match kind {
            ScalarKind::String => {
                let s: String = (0..RANDOM_STRING_LEN)
                    .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
                    .collect();
                Value::String(s)
            }
            ScalarKind::Integer => Value::from(rng.gen_range(1..=100_i64)),
            ScalarKind::Number => {
                // Two decimals keeps payloads readable in logs
                let n = (rng.gen_range(0.0..100.0_f64) * 100.0).round() / 100.0;
                Value::from(n)
            }
            ScalarKind::Boolean => Value::Bool(rng.gen_bool(0.5)),
        }
    }
}

impl Default for ExampleGenerator {
    fn default() -> Self {
        Self::fixed()
    }
}

impl std::fmt::Debug for ExampleGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleGenerator")
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_example_wins() {
        let generator = ExampleGenerator::fixed();
        let value = generator.extract_value(&json!({
            "type": "integer",
            "example": {"anything": "goes"}
        }));

        assert_eq!(value, json!({"anything": "goes"}));
    }

    #[test]
    fn test_fixed_scalars() {
        let generator = ExampleGenerator::fixed();

        assert_eq!(generator.extract_value(&json!({"type": "string"})), json!("string"));
        assert_eq!(generator.extract_value(&json!({"type": "integer"})), json!(1));
        assert_eq!(generator.extract_value(&json!({"type": "number"})), json!(1.5));
        assert_eq!(generator.extract_value(&json!({"type": "boolean"})), json!(true));
    }

    #[test]
    fn test_array_of_integers() {
        let generator = ExampleGenerator::fixed();
        let value = generator.extract_value(&json!({"type": "array", "items": {"type": "integer"}}));

        let items = value.as_array().unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().all(Value::is_i64));
    }

    #[test]
    fn test_array_without_items_is_empty() {
        let generator = ExampleGenerator::fixed();
        assert_eq!(generator.extract_value(&json!({"type": "array"})), json!([]));
    }

    #[test]
    fn test_object_properties() {
        let generator = ExampleGenerator::fixed();
        let value = generator.extract_value(&json!({
            "type": "object",
            "properties": {"n": {"type": "string"}}
        }));

        assert!(value["n"].is_string());
    }

    #[test]
    fn test_unknown_and_reference_yield_null() {
        let generator = ExampleGenerator::fixed();

        assert_eq!(generator.extract_value(&json!({})), Value::Null);
        assert_eq!(generator.extract_value(&json!({"type": "file"})), Value::Null);
        assert_eq!(generator.extract_value(&Value::Null), Value::Null);
        assert_eq!(
            generator.extract_value(&json!({"$ref": "#/components/schemas/Pet"})),
            Value::Null
        );
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "score": {"type": "number"},
                "active": {"type": "boolean"}
            }
        });

        let a = ExampleGenerator::new(ExampleMode::Seeded(42)).extract_value(&schema);
        let b = ExampleGenerator::new(ExampleMode::Seeded(42)).extract_value(&schema);
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_values_in_range() {
        let generator = ExampleGenerator::new(ExampleMode::Seeded(7));

        for _ in 0..50 {
            let n = generator.extract_value(&json!({"type": "integer"})).as_i64().unwrap();
            assert!((1..=100).contains(&n));

            let s = generator.extract_value(&json!({"type": "string"}));
            let s = s.as_str().unwrap();
            assert_eq!(s.len(), 8);
            assert!(s.chars().all(|c| c.is_ascii_alphabetic()));
        }
    }
}
