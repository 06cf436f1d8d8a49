//! HTTP request dispatch with timeout and retry

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use openapi_parser::HttpMethod;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{ReplayError, Result};
use crate::settings::ReplaySettings;

/// A request ready to send: path parameters already substituted
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// Endpoint key, e.g. `GET /pet/{petId}`
    pub api: String,
    pub method: HttpMethod,
    /// Concrete path, e.g. `/pet/123`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Outcome of one dispatched request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Endpoint key
    pub api: String,
    pub method: HttpMethod,
    pub url: String,
    /// `None` when every attempt failed before a response arrived
    pub status_code: Option<u16>,
    /// Response text, or the failure message
    pub response: String,
    /// Failed attempts before the final one
    pub retries: u32,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Body that was sent
    pub payload: Option<Value>,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.status_code.is_some_and(|code| (200..300).contains(&code))
    }

    /// Response parsed as JSON, if it is JSON
    pub fn response_json(&self) -> Option<Value> {
        serde_json::from_str(&self.response).ok()
    }

    /// The `id` field of a JSON response body
    pub fn created_id(&self) -> Option<Value> {
        self.response_json()?
            .get("id")
            .filter(|id| !id.is_null())
            .cloned()
    }
}

/// Dispatches prepared requests against a base URL
pub struct RequestDispatcher {
    client: Client,
    base_url: String,
    headers: IndexMap<String, String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RequestDispatcher {
    /// Create a dispatcher for a base URL
    pub fn new(base_url: &str, settings: &ReplaySettings) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| ReplayError::InvalidBaseUrl(e.to_string()))?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ReplayError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: settings.headers.clone(),
            // Always make at least one attempt
            max_retries: settings.max_retries.max(1),
            retry_delay: settings.retry_delay(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request, retrying on transport failures
    pub async fn execute(&self, request: &PreparedRequest) -> ExecutionRecord {
        let url = format!("{}{}", self.base_url, request.path);
        let started = Instant::now();
        let mut attempt = 0;

        while attempt < self.max_retries {
            match self.send_once(request, &url).await {
                Ok((status, response)) => {
                    info!("{} -> {} ({} retries)", request.api, status, attempt);
                    return self.record(request, url, Some(status), response, attempt, started);
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.max_retries,
                        url,
                        e
                    );
                    attempt += 1;
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        error!(
            "API request failed after {} retries: {}",
            self.max_retries, url
        );
        let message = format!("Failed after {} retries", self.max_retries);
        self.record(request, url, None, message, self.max_retries, started)
    }

    /// Send several requests concurrently, preserving input order
    pub async fn execute_many(&self, requests: &[PreparedRequest]) -> Vec<ExecutionRecord> {
        join_all(requests.iter().map(|request| self.execute(request))).await
    }

    async fn send_once(
        &self,
        request: &PreparedRequest,
        url: &str,
    ) -> std::result::Result<(u16, String), reqwest::Error> {
        let mut builder = self.client.request(to_reqwest(request.method), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!("Sending {} {}", request.method, url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn record(
        &self,
        request: &PreparedRequest,
        url: String,
        status_code: Option<u16>,
        response: String,
        retries: u32,
        started: Instant,
    ) -> ExecutionRecord {
        ExecutionRecord {
            api: request.api.clone(),
            method: request.method,
            url,
            status_code,
            response,
            retries,
            elapsed_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            payload: request.body.clone(),
        }
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn test_app() -> Router {
        Router::new()
            .route(
                "/pet",
                post(|Json(body): Json<Value>| async move {
                    (StatusCode::CREATED, Json(json!({"id": 42, "echo": body})))
                }),
            )
            .route(
                "/pet/:id",
                get(|Path(id): Path<String>| async move { Json(json!({"id": id})) }),
            )
            .route(
                "/search",
                get(
                    |Query(params): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                        let key = headers
                            .get("x-api-key")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        Json(json!({"q": params.get("q"), "key": key}))
                    },
                ),
            )
    }

    fn fast_settings() -> ReplaySettings {
        ReplaySettings {
            max_retries: 2,
            retry_delay_ms: 10,
            timeout_secs: 5,
            ..ReplaySettings::default()
        }
    }

    #[tokio::test]
    async fn test_execute_post_with_body() {
        let base = serve(test_app()).await;
        let dispatcher = RequestDispatcher::new(&base, &fast_settings()).unwrap();

        let record = dispatcher
            .execute(&PreparedRequest {
                api: "POST /pet".to_string(),
                method: HttpMethod::Post,
                path: "/pet".to_string(),
                query: vec![],
                body: Some(json!({"name": "doggie"})),
            })
            .await;

        assert_eq!(record.status_code, Some(201));
        assert!(record.is_success());
        assert_eq!(record.retries, 0);
        assert_eq!(record.created_id(), Some(json!(42)));
        assert_eq!(record.response_json().unwrap()["echo"]["name"], "doggie");
    }

    #[tokio::test]
    async fn test_execute_sends_query_and_headers() {
        let base = serve(test_app()).await;
        let mut settings = fast_settings();
        settings
            .headers
            .insert("X-Api-Key".to_string(), "secret".to_string());
        let dispatcher = RequestDispatcher::new(&base, &settings).unwrap();

        let record = dispatcher
            .execute(&PreparedRequest {
                api: "GET /search".to_string(),
                method: HttpMethod::Get,
                path: "/search".to_string(),
                query: vec![("q".to_string(), "cats".to_string())],
                body: None,
            })
            .await;

        let response = record.response_json().unwrap();
        assert_eq!(response["q"], "cats");
        assert_eq!(response["key"], "secret");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let base = serve(test_app()).await;
        let dispatcher = RequestDispatcher::new(&base, &fast_settings()).unwrap();

        let record = dispatcher
            .execute(&PreparedRequest {
                api: "GET /missing".to_string(),
                method: HttpMethod::Get,
                path: "/missing".to_string(),
                query: vec![],
                body: None,
            })
            .await;

        assert_eq!(record.status_code, Some(404));
        assert!(!record.is_success());
        assert_eq!(record.retries, 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dispatcher =
            RequestDispatcher::new(&format!("http://{}", addr), &fast_settings()).unwrap();
        let record = dispatcher
            .execute(&PreparedRequest {
                api: "GET /pet/1".to_string(),
                method: HttpMethod::Get,
                path: "/pet/1".to_string(),
                query: vec![],
                body: None,
            })
            .await;

        assert_eq!(record.status_code, None);
        assert_eq!(record.retries, 2);
        assert_eq!(record.response, "Failed after 2 retries");
    }

    #[tokio::test]
    async fn test_zero_retries_still_sends_once() {
        let base = serve(test_app()).await;
        let settings = ReplaySettings {
            max_retries: 0,
            ..fast_settings()
        };
        let dispatcher = RequestDispatcher::new(&base, &settings).unwrap();

        let record = dispatcher
            .execute(&PreparedRequest {
                api: "GET /pet/{id}".to_string(),
                method: HttpMethod::Get,
                path: "/pet/7".to_string(),
                query: vec![],
                body: None,
            })
            .await;

        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.retries, 0);
        assert_eq!(record.response_json().unwrap()["id"], "7");
    }

    #[tokio::test]
    async fn test_execute_many_preserves_order() {
        let base = serve(test_app()).await;
        let dispatcher = RequestDispatcher::new(&base, &fast_settings()).unwrap();

        let requests: Vec<PreparedRequest> = (1..=3)
            .map(|i| PreparedRequest {
                api: "GET /pet/{id}".to_string(),
                method: HttpMethod::Get,
                path: format!("/pet/{}", i),
                query: vec![],
                body: None,
            })
            .collect();

        let records = dispatcher.execute_many(&requests).await;
        let ids: Vec<Value> = records
            .iter()
            .map(|r| r.response_json().unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("1"), json!("2"), json!("3")]);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = RequestDispatcher::new("not a url", &ReplaySettings::default());
        assert!(matches!(result, Err(ReplayError::InvalidBaseUrl(_))));
    }
}
