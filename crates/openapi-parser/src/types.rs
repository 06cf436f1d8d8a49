//! Type definitions for parsed OpenAPI specs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::SchemaDefinitions;

/// HTTP methods supported by OpenAPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Whether requests with this method carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            other => Err(format!("unknown HTTP method: {}", other)),
        }
    }
}

/// Parameter location in HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// A parameter for an API operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationParameter {
    /// Parameter name
    pub name: String,
    /// Where the parameter is located
    pub location: ParameterLocation,
    /// Whether the parameter is required
    pub required: bool,
    /// Parameter description
    pub description: Option<String>,
    /// JSON Schema for the parameter (unresolved)
    pub schema: Option<Value>,
    /// Example value
    pub example: Option<Value>,
}

/// Request body schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Whether the body is required
    pub required: bool,
    /// Content type (e.g., "application/json")
    pub content_type: String,
    /// JSON Schema for the body, `$ref`s left in place
    pub schema: Option<Value>,
    /// Description
    pub description: Option<String>,
}

/// Response schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// HTTP status code
    pub status_code: String,
    /// Content type
    pub content_type: Option<String>,
    /// JSON Schema for the response
    pub schema: Option<Value>,
    /// Description
    pub description: Option<String>,
}

/// A single API operation extracted from the spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOperation {
    /// Unique operation ID (from spec or generated)
    pub operation_id: String,
    /// HTTP method
    pub method: HttpMethod,
    /// URL path (e.g., "/pet/{petId}")
    pub path: String,
    /// Short summary
    pub summary: Option<String>,
    /// Tags for categorization
    pub tags: Vec<String>,
    /// Parameters (path, query, header, cookie)
    pub parameters: Vec<OperationParameter>,
    /// Request body schema
    pub request_body: Option<RequestBody>,
    /// Response schemas keyed by status code
    pub responses: Vec<ResponseSchema>,
}

impl ApiOperation {
    /// Endpoint key, e.g. `POST /pet`
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Parameters at the given location
    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &OperationParameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }
}

/// Parsed OpenAPI specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSpec {
    /// API title
    pub title: String,
    /// API description
    pub description: Option<String>,
    /// API version
    pub version: String,
    /// Server URLs
    pub servers: Vec<ServerInfo>,
    /// All extracted operations
    pub operations: Vec<ApiOperation>,
    /// Component schemas by name (`components.schemas` or `definitions`)
    pub schemas: IndexMap<String, Value>,
}

impl ParsedSpec {
    /// Build a definition table for schema resolution
    pub fn definitions(&self) -> SchemaDefinitions {
        SchemaDefinitions::new(self.schemas.clone())
    }

    /// First declared server URL, if any
    pub fn base_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }

    /// Find an operation by its `METHOD /path` key
    pub fn operation(&self, key: &str) -> Option<&ApiOperation> {
        self.operations.iter().find(|op| op.key() == key)
    }
}

/// Server information from the spec
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server URL
    pub url: String,
    /// Server description
    pub description: Option<String>,
}

// --- Raw OpenAPI 3.x / Swagger 2.0 structures for parsing ---

/// Raw OpenAPI document structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOpenApiSpec {
    pub openapi: Option<String>,
    pub swagger: Option<String>,
    pub info: RawInfo,
    #[serde(default)]
    pub servers: Vec<RawServer>,
    /// Swagger 2.0 host
    pub host: Option<String>,
    /// Swagger 2.0 base path
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub paths: IndexMap<String, RawPathItem>,
    #[serde(default)]
    pub components: Option<RawComponents>,
    /// Swagger 2.0 schema definitions
    #[serde(default)]
    pub definitions: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInfo {
    pub title: String,
    pub description: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawServer {
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPathItem {
    pub get: Option<RawOperation>,
    pub post: Option<RawOperation>,
    pub put: Option<RawOperation>,
    pub patch: Option<RawOperation>,
    pub delete: Option<RawOperation>,
    pub head: Option<RawOperation>,
    pub options: Option<RawOperation>,
    pub trace: Option<RawOperation>,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOperation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
    pub request_body: Option<RawRequestBody>,
    #[serde(default)]
    pub responses: IndexMap<String, RawResponse>,
    /// Swagger 2.0 request content types
    #[serde(default)]
    pub consumes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawParameter {
    /// Parameter name (optional when $ref is used)
    #[serde(default)]
    pub name: String,
    /// Parameter location (optional when $ref is used)
    #[serde(rename = "in", default)]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Value>,
    pub example: Option<Value>,
    /// Swagger 2.0 inline type for non-body parameters
    #[serde(rename = "type")]
    pub param_type: Option<String>,
    /// Swagger 2.0 inline enum for non-body parameters
    #[serde(rename = "enum")]
    pub enumeration: Option<Vec<Value>>,
    /// Swagger 2.0 inline item schema for array parameters
    pub items: Option<Value>,
    /// Reference to a parameter in components/parameters
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRequestBody {
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: IndexMap<String, RawMediaType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMediaType {
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<IndexMap<String, RawMediaType>>,
    /// Swagger 2.0 response schema
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComponents {
    #[serde(default)]
    pub schemas: IndexMap<String, Value>,
    #[serde(default)]
    pub parameters: IndexMap<String, RawParameter>,
}
