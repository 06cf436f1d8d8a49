//! Main OpenAPI parser

use crate::error::{ParseError, ParseResult};
use crate::operations::OperationExtractor;
use crate::types::*;
use indexmap::IndexMap;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

/// OpenAPI 3.x / Swagger 2.0 parser
pub struct OpenApiParser;

impl OpenApiParser {
    /// Parse a spec from a string (auto-detects JSON/YAML)
    pub fn parse(content: &str) -> ParseResult<ParsedSpec> {
        let content = Self::sanitize_large_numbers(content);

        // Try JSON first, then YAML
        let raw_spec: RawOpenApiSpec = if content.trim().starts_with('{') {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        Self::convert_spec(raw_spec)
    }

    /// Parse a spec from JSON
    pub fn parse_json(content: &str) -> ParseResult<ParsedSpec> {
        let content = Self::sanitize_large_numbers(content);
        let raw_spec: RawOpenApiSpec = serde_json::from_str(&content)?;
        Self::convert_spec(raw_spec)
    }

    /// Parse a spec from YAML
    pub fn parse_yaml(content: &str) -> ParseResult<ParsedSpec> {
        let content = Self::sanitize_large_numbers(content);
        let raw_spec: RawOpenApiSpec = serde_yaml::from_str(&content)?;
        Self::convert_spec(raw_spec)
    }

    /// Load and parse a spec file
    pub fn parse_file(path: impl AsRef<Path>) -> ParseResult<ParsedSpec> {
        let path = path.as_ref();
        info!("Loading OpenAPI spec from: {:?}", path);

        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&content),
            Some("yaml") | Some("yml") => Self::parse_yaml(&content),
            _ => Self::parse(&content),
        }
    }

    /// Load a spec from a URL or a file path
    pub async fn load(location: &str) -> ParseResult<ParsedSpec> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::fetch_and_parse(location).await
        } else {
            Self::parse_file(location)
        }
    }

    /// Sanitize large numbers that may cause parsing issues.
    /// Some specs use very large min/max values which serde_yaml rejects
    /// with "JSON number out of range"; the exact value doesn't matter here.
    fn sanitize_large_numbers(content: &str) -> String {
        static LARGE_BOUND: OnceLock<Regex> = OnceLock::new();
        let re_large = LARGE_BOUND.get_or_init(|| {
            Regex::new(
                r"(?m)^(\s*(?:minimum|maximum|exclusiveMinimum|exclusiveMaximum):\s*)(-?\d{16,})",
            )
            .expect("bound pattern is valid")
        });

        re_large
            .replace_all(content, |caps: &regex::Captures| {
                let prefix = &caps[1];
                if caps[2].starts_with('-') {
                    format!("{}-2147483648", prefix)
                } else {
                    format!("{}2147483647", prefix)
                }
            })
            .into_owned()
    }

    /// Fetch and parse a spec from a URL
    pub async fn fetch_and_parse(url: &str) -> ParseResult<ParsedSpec> {
        let parsed = url::Url::parse(url).map_err(|e| ParseError::InvalidUrl(e.to_string()))?;
        info!("Fetching OpenAPI spec from: {}", parsed);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ParseError::HttpError(e.to_string()))?;

        let response = client
            .get(parsed.clone())
            .header("Accept", "application/json, application/yaml, text/yaml")
            .send()
            .await
            .map_err(|e| ParseError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ParseError::FetchError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let content = response
            .text()
            .await
            .map_err(|e| ParseError::FetchError(e.to_string()))?;

        if content_type.contains("yaml") || url.ends_with(".yaml") || url.ends_with(".yml") {
            Self::parse_yaml(&content)
        } else {
            Self::parse(&content)
        }
    }

    /// Convert a raw spec to our internal format
    fn convert_spec(raw: RawOpenApiSpec) -> ParseResult<ParsedSpec> {
        let version = match (&raw.openapi, &raw.swagger) {
            (Some(v), _) if v.starts_with("3.") => v.clone(),
            (None, Some(v)) if v.starts_with("2.") => v.clone(),
            (Some(v), _) | (None, Some(v)) => return Err(ParseError::UnsupportedVersion(v.clone())),
            (None, None) => return Err(ParseError::UnsupportedVersion("missing".to_string())),
        };

        debug!("Parsing spec version {}: {}", version, raw.info.title);

        let operations = OperationExtractor::extract(&raw)?;
        debug!("Extracted {} operations", operations.len());

        let schemas: IndexMap<String, serde_json::Value> = match &raw.components {
            Some(components) if !components.schemas.is_empty() => components.schemas.clone(),
            _ => raw.definitions.clone(),
        };
        debug!("Found {} component schemas", schemas.len());

        let servers = Self::convert_servers(&raw);

        Ok(ParsedSpec {
            title: raw.info.title,
            description: raw.info.description,
            version: raw.info.version,
            servers,
            operations,
            schemas,
        })
    }

    fn convert_servers(raw: &RawOpenApiSpec) -> Vec<ServerInfo> {
        if !raw.servers.is_empty() {
            return raw
                .servers
                .iter()
                .map(|s| ServerInfo {
                    url: s.url.clone(),
                    description: s.description.clone(),
                })
                .collect();
        }

        // Swagger 2.0: {scheme}://{host}{basePath}
        let Some(host) = &raw.host else {
            return Vec::new();
        };
        let scheme = raw
            .schemes
            .iter()
            .find(|s| s.as_str() == "https")
            .or_else(|| raw.schemes.first())
            .map(String::as_str)
            .unwrap_or("https");
        let base_path = raw.base_path.as_deref().unwrap_or("");

        vec![ServerInfo {
            url: format!("{}://{}{}", scheme, host, base_path),
            description: None,
        }]
    }
}
