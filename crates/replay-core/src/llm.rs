//! Execution planning through an OpenAI-compatible chat-completions API

use async_trait::async_trait;
use openapi_parser::ApiOperation;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{ReplayError, Result};
use crate::planner::{ExecutionPlan, SequencePlanner};
use crate::settings::LlmSettings;

const SYSTEM_PROMPT: &str = "Plan API execution";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Asks a chat model for the execution order.
///
/// The reply must be a `{"execution_order": [...]}` document naming only
/// operations from the spec; anything else is an error.
pub struct LlmPlanner {
    client: Client,
    settings: LlmSettings,
}

impl LlmPlanner {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        url::Url::parse(&settings.endpoint)
            .map_err(|e| ReplayError::InvalidBaseUrl(format!("{}: {}", settings.endpoint, e)))?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ReplayError::HttpClient(e.to_string()))?;

        Ok(Self { client, settings })
    }

    fn prompt(operations: &[ApiOperation]) -> String {
        let apis: Vec<String> = operations.iter().map(ApiOperation::key).collect();
        format!(
            "You are an API test execution planner. Given the following API endpoints, \
             determine the correct execution order. Consider dependencies (e.g. `POST` \
             should run before `GET`, `DELETE` should be last).\n\n\
             APIs: {}\n\n\
             Respond only with JSON of the form \
             {{\"execution_order\": [\"POST /users\", \"GET /users\", \"DELETE /users\"]}}",
            serde_json::to_string(&apis).unwrap_or_default()
        )
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let body = ChatRequest {
            model: &self.settings.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT.to_string()),
                ChatMessage::new("user", prompt),
            ],
        };

        let mut request = self.client.post(&self.settings.endpoint).json(&body);
        if let Some(api_key) = &self.settings.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReplayError::PlannerRequest(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ReplayError::PlannerRequest(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            error!("Planner request failed with status {}: {}", status, text);
            return Err(ReplayError::PlannerRequest(format!("HTTP {} - {}", status, text)));
        }

        let reply: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ReplayError::PlannerRequest(format!("Malformed completion: {}", e)))?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ReplayError::PlannerRequest("Completion has no choices".to_string()))
    }
}

#[async_trait]
impl SequencePlanner for LlmPlanner {
    async fn plan(&self, operations: &[ApiOperation]) -> Result<ExecutionPlan> {
        info!(
            "Asking {} to order {} operations",
            self.settings.model,
            operations.len()
        );
        let content = self.complete(Self::prompt(operations)).await?;
        debug!("Planner replied: {}", content);

        let plan = ExecutionPlan::from_json(strip_code_fence(&content))?;
        plan.validate(operations)?;
        Ok(plan)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Models often wrap JSON in a Markdown code block
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop an info string such as `json`
    match inner.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}
