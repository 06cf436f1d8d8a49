//! # openapi-parser
//!
//! OpenAPI parser for api-replay.
//! Loads OpenAPI 3.x and Swagger 2.0 specs, resolves component schemas and
//! synthesizes example payloads for requests.

mod types;
mod parser;
mod operations;
mod schema;
mod resolver;
mod example;
mod error;

pub use types::*;
pub use parser::OpenApiParser;
pub use operations::OperationExtractor;
pub use schema::{reference_target, CompositionKind, ScalarKind, SchemaDefinitions, SchemaNode, SchemaShape};
pub use resolver::{MissingRefPolicy, ResolverConfig, SchemaResolver, DEFAULT_MAX_DEPTH};
pub use example::{ExampleGenerator, ExampleMode};
pub use error::{ParseError, ParseResult};
