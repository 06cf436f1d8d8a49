//! Request payload synthesis from operation schemas

use indexmap::IndexMap;
use openapi_parser::{
    ApiOperation, OperationParameter, ParameterLocation, SchemaNode, SchemaResolver, SchemaShape,
};
use serde_json::Value;
use tracing::debug;

/// Number of items generated for array bodies
const ARRAY_BODY_LEN: usize = 2;

/// Builds request bodies, path values and query values for operations
pub struct PayloadBuilder<'a> {
    resolver: SchemaResolver<'a>,
}

impl<'a> PayloadBuilder<'a> {
    pub fn new(resolver: SchemaResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &SchemaResolver<'a> {
        &self.resolver
    }

    /// Request body for an operation, if it declares one
    pub fn build_body(&self, operation: &ApiOperation) -> Option<Value> {
        let schema = operation.request_body.as_ref()?.schema.as_ref()?;
        let body = self.synthesize(schema);
        debug!("Synthesized body for {}: {}", operation.key(), body);
        Some(body)
    }

    /// Synthesize a value for any raw schema
    pub fn synthesize(&self, schema: &Value) -> Value {
        self.synthesize_node(&SchemaNode::from_value(schema))
    }

    fn synthesize_node(&self, node: &SchemaNode) -> Value {
        if let Some(example) = &node.example {
            return example.clone();
        }

        match &node.shape {
            SchemaShape::Reference { .. }
            | SchemaShape::Composition { .. }
            | SchemaShape::Object { .. } => self.resolver.resolve_schema(node, 0),
            SchemaShape::Array { items: Some(items) } => Value::Array(
                (0..ARRAY_BODY_LEN)
                    .map(|_| self.synthesize_node(items))
                    .collect(),
            ),
            SchemaShape::Array { items: None }
            | SchemaShape::Scalar(_)
            | SchemaShape::Unknown => match node.first_enum_value() {
                Some(first) => first.clone(),
                None => self.resolver.extract_example(node),
            },
        }
    }

    /// Values for every path parameter, keyed by name.
    ///
    /// Preference order: the parameter's example, an id created by an
    /// earlier call on the parent collection, a value synthesized from the
    /// parameter schema.
    pub fn path_values(
        &self,
        operation: &ApiOperation,
        created_ids: &IndexMap<String, Value>,
    ) -> IndexMap<String, String> {
        operation
            .parameters_in(ParameterLocation::Path)
            .map(|param| {
                let value = param
                    .example
                    .clone()
                    .or_else(|| created_id_for(&operation.path, &param.name, created_ids))
                    .unwrap_or_else(|| self.parameter_value(param));
                (param.name.clone(), render(&value))
            })
            .collect()
    }

    /// Values for required query parameters
    pub fn query_values(&self, operation: &ApiOperation) -> Vec<(String, String)> {
        operation
            .parameters_in(ParameterLocation::Query)
            .filter(|param| param.required)
            .flat_map(|param| {
                let value = param
                    .example
                    .clone()
                    .unwrap_or_else(|| self.parameter_value(param));
                match value {
                    // Arrays become repeated keys
                    Value::Array(items) => items
                        .iter()
                        .map(|item| (param.name.clone(), render(item)))
                        .collect::<Vec<_>>(),
                    other => vec![(param.name.clone(), render(&other))],
                }
            })
            .collect()
    }

    fn parameter_value(&self, param: &OperationParameter) -> Value {
        match param.schema.as_ref().map(|schema| self.synthesize(schema)) {
            Some(Value::Null) | None => Value::String("1".to_string()),
            Some(value) => value,
        }
    }
}

/// Find an id recorded for the collection that owns `{param}` in `path`.
///
/// For `/pet/{petId}` this looks for ids created by `POST /pet` or
/// `PUT /pet`, most recent first.
fn created_id_for(
    path: &str,
    param: &str,
    created_ids: &IndexMap<String, Value>,
) -> Option<Value> {
    let placeholder = format!("/{{{}}}", param);
    let collection = &path[..path.find(&placeholder)?];

    created_ids
        .iter()
        .rev()
        .find(|(api, _)| {
            api.split_once(' ')
                .map(|(method, created_path)| {
                    matches!(method, "POST" | "PUT") && created_path == collection
                })
                .unwrap_or(false)
        })
        .map(|(_, id)| id.clone())
}

/// Render a value for use in a URL
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
