//! Error types for replay-core

use thiserror::Error;

/// Result type alias for replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Replay error types
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Invalid OpenAPI spec: {0}")]
    InvalidSpec(#[from] openapi_parser::ParseError),

    #[error("No base URL - pass one explicitly or declare a server in the spec")]
    MissingBaseUrl,

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Unknown operation in plan: {0}")]
    UnknownOperation(String),

    #[error("Invalid execution plan: {0}")]
    InvalidPlan(String),

    #[error("Planner request failed: {0}")]
    PlannerRequest(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
