//! Operation extraction from OpenAPI specs

use crate::error::ParseResult;
use crate::types::*;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Extracts operations from raw OpenAPI spec structures.
///
/// Schemas are kept as written; `$ref`s are resolved later, per request,
/// by the `SchemaResolver`.
pub struct OperationExtractor;

impl OperationExtractor {
    /// Extract all operations from a raw spec
    pub fn extract(spec: &RawOpenApiSpec) -> ParseResult<Vec<ApiOperation>> {
        let mut operations = Vec::new();

        let empty_parameters = IndexMap::new();
        let shared_parameters = spec
            .components
            .as_ref()
            .map(|c| &c.parameters)
            .unwrap_or(&empty_parameters);

        for (path, path_item) in &spec.paths {
            let methods = [
                (HttpMethod::Get, &path_item.get),
                (HttpMethod::Post, &path_item.post),
                (HttpMethod::Put, &path_item.put),
                (HttpMethod::Patch, &path_item.patch),
                (HttpMethod::Delete, &path_item.delete),
                (HttpMethod::Head, &path_item.head),
                (HttpMethod::Options, &path_item.options),
                (HttpMethod::Trace, &path_item.trace),
            ];

            for (method, operation) in methods {
                if let Some(op) = operation {
                    operations.push(Self::extract_operation(
                        path,
                        method,
                        op,
                        &path_item.parameters,
                        shared_parameters,
                    ));
                }
            }
        }

        Ok(operations)
    }

    fn extract_operation(
        path: &str,
        method: HttpMethod,
        operation: &RawOperation,
        path_params: &[RawParameter],
        shared: &IndexMap<String, RawParameter>,
    ) -> ApiOperation {
        let operation_id = operation
            .operation_id
            .clone()
            .unwrap_or_else(|| Self::generate_operation_id(path, method));

        // Operation-level parameters override path-level ones with the same name
        let mut parameters: Vec<OperationParameter> = Vec::new();
        let mut swagger_body: Option<RequestBody> = None;
        for raw in path_params.iter().chain(&operation.parameters) {
            let Some(raw) = Self::dereference_parameter(raw, shared) else {
                continue;
            };

            if raw.location == "body" {
                swagger_body = Some(Self::swagger_body(raw, operation));
                continue;
            }

            if let Some(param) = Self::convert_parameter(raw) {
                parameters.retain(|existing| existing.name != param.name);
                parameters.push(param);
            }
        }

        let request_body = operation
            .request_body
            .as_ref()
            .and_then(Self::extract_request_body)
            .or(swagger_body);

        ApiOperation {
            operation_id,
            method,
            path: path.to_string(),
            summary: operation.summary.clone(),
            tags: operation.tags.clone(),
            parameters,
            request_body,
            responses: Self::extract_responses(&operation.responses),
        }
    }

    /// Generate an operation ID from path and method
    fn generate_operation_id(path: &str, method: HttpMethod) -> String {
        // /users/{id}/posts -> get_users_id_posts
        let path_part = path
            .trim_start_matches('/')
            .replace('/', "_")
            .replace(['{', '}'], "");

        format!("{}_{}", method.as_str().to_lowercase(), path_part)
    }

    /// Follow a `#/components/parameters/...` reference
    fn dereference_parameter<'p>(
        param: &'p RawParameter,
        shared: &'p IndexMap<String, RawParameter>,
    ) -> Option<&'p RawParameter> {
        let Some(reference) = &param.reference else {
            return Some(param);
        };

        let name = crate::schema::reference_target(reference);
        let found = shared.get(name);
        if found.is_none() {
            warn!("Unresolved parameter reference: {}", reference);
        }
        found
    }

    fn convert_parameter(param: &RawParameter) -> Option<OperationParameter> {
        let location = match param.location.as_str() {
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "header" => ParameterLocation::Header,
            "cookie" => ParameterLocation::Cookie,
            other => {
                debug!("Skipping parameter {} in {}", param.name, other);
                return None;
            }
        };

        Some(OperationParameter {
            name: param.name.clone(),
            location,
            required: param.required || location == ParameterLocation::Path,
            description: param.description.clone(),
            schema: param.schema.clone().or_else(|| Self::inline_schema(param)),
            example: param.example.clone(),
        })
    }

    /// Swagger 2.0 declares non-body parameter types inline
    fn inline_schema(param: &RawParameter) -> Option<Value> {
        let param_type = param.param_type.as_ref()?;

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String(param_type.clone()));
        if let Some(items) = &param.items {
            schema.insert("items".to_string(), items.clone());
        }
        if let Some(values) = &param.enumeration {
            schema.insert("enum".to_string(), Value::Array(values.clone()));
        }
        Some(Value::Object(schema))
    }

    fn swagger_body(param: &RawParameter, operation: &RawOperation) -> RequestBody {
        let content_type = operation
            .consumes
            .iter()
            .find(|ct| ct.contains("json"))
            .or_else(|| operation.consumes.first())
            .cloned()
            .unwrap_or_else(|| "application/json".to_string());

        RequestBody {
            required: param.required,
            content_type,
            schema: param.schema.clone(),
            description: param.description.clone(),
        }
    }

    /// Extract request body information, preferring JSON content
    fn extract_request_body(body: &RawRequestBody) -> Option<RequestBody> {
        let (content_type, media) = body
            .content
            .iter()
            .find(|(ct, _)| ct.contains("json"))
            .or_else(|| body.content.first())?;

        Some(RequestBody {
            required: body.required,
            content_type: content_type.clone(),
            schema: media.schema.clone(),
            description: body.description.clone(),
        })
    }

    fn extract_responses(responses: &IndexMap<String, RawResponse>) -> Vec<ResponseSchema> {
        responses
            .iter()
            .map(|(status, response)| {
                let (content_type, schema) = response
                    .content
                    .as_ref()
                    .and_then(|content| {
                        content
                            .iter()
                            .find(|(ct, _)| ct.contains("json"))
                            .or_else(|| content.first())
                            .map(|(ct, media)| (Some(ct.clone()), media.schema.clone()))
                    })
                    .unwrap_or_else(|| (None, response.schema.clone()));

                ResponseSchema {
                    status_code: status.clone(),
                    content_type,
                    schema,
                    description: response.description.clone(),
                }
            })
            .collect()
    }
}
