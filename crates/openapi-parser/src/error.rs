//! Failures while loading a spec document: reading it from disk or over
//! HTTP, decoding JSON/YAML, or meeting a version other than OpenAPI 3.x or
//! Swagger 2.0. Schema resolution itself never fails.

use thiserror::Error;

pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug)]
pub enum ParseError {
    /// The server answered, but not with a usable document
    #[error("Failed to fetch spec document: {0}")]
    FetchError(String),

    #[error("Invalid spec URL: {0}")]
    InvalidUrl(String),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// No response at all (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Cannot read spec file: {0}")]
    IoError(#[from] std::io::Error),

    /// Neither `openapi: 3.x` nor `swagger: 2.x`
    #[error("Unsupported spec version: {0} (expected OpenAPI 3.x or Swagger 2.0)")]
    UnsupportedVersion(String),
}
