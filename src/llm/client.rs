//! Extraction client for an OpenAI-compatible chat completions endpoint.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::parser::parse_extraction;
use super::prompt::{build_extraction_prompt, SYSTEM_PROMPT};
use crate::models::{ExtractedFields, RawReport};

/// Configuration for the extraction client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat completions service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key; read from `OPENAI_API_KEY`, never the config file.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Model used for extraction.
    #[serde(default = "default_model")]
    pub model: String,
    /// Temperature for generation; low for consistent extraction.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens in the response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum characters of report content to send.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    500
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_content_chars() -> usize {
    12000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

/// Errors from a single extraction attempt.
///
/// Transient kinds are worth retrying; a malformed response is not, since
/// repeating the same call is expected to reproduce the same failure.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("extraction service rate limited")]
    RateLimited,

    #[error("extraction request timed out")]
    Timeout,

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
}

impl ExtractionError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::MalformedResponse(_))
    }

    /// Stable kind name for logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Stateless client for the structured-extraction service.
///
/// Holds no per-call state, so a single instance is shared across all
/// pipeline workers.
pub struct ExtractionClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ExtractionClient {
    /// Create a new extraction client.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Run one extraction attempt for a report.
    pub async fn extract(&self, report: &RawReport) -> Result<ExtractedFields, ExtractionError> {
        let prompt = build_extraction_prompt(report, self.config.max_content_chars);
        debug!(report_id = report.id, "requesting extraction");
        let response = self.call_chat(&prompt).await?;
        parse_extraction(&response)
    }

    async fn call_chat(&self, prompt: &str) -> Result<String, ExtractionError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Timeout
            } else {
                ExtractionError::ServiceUnavailable(e.to_string())
            }
        })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExtractionError::RateLimited);
        }
        if !status.is_success() {
            return Err(ExtractionError::ServiceUnavailable(format!("HTTP {}", status)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ExtractionError::MalformedResponse("no choices in response".to_string()))
    }
}

#[async_trait::async_trait]
impl super::Extractor for ExtractionClient {
    async fn extract(&self, report: &RawReport) -> Result<ExtractedFields, ExtractionError> {
        ExtractionClient::extract(self, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn report() -> RawReport {
        RawReport {
            id: 501,
            date_posted: None,
            username: None,
            raw_content: "Caught 15 bluegill on waxies in 8 feet.".to_string(),
            weather_badge: None,
            image_urls: None,
            scraped_at: Utc::now(),
        }
    }

    fn client_for(server: &MockServer) -> ExtractionClient {
        ExtractionClient::new(LlmConfig {
            endpoint: server.uri(),
            timeout_secs: 5,
            ..Default::default()
        })
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_extract_parses_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
                r#"{"species_caught": "Bluegill", "water_depth_feet": 8, "bait_lure": "waxies"}"#,
            )))
            .mount(&server)
            .await;

        let fields = client_for(&server).extract(&report()).await.unwrap();
        assert_eq!(fields.species_caught.as_deref(), Some("Bluegill"));
        assert_eq!(fields.water_depth_feet, Some(8.0));
        assert_eq!(fields.bait_lure.as_deref(), Some("waxies"));
        assert_eq!(fields.water_temp_f, None);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).extract(&report()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).extract(&report()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::ServiceUnavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unparseable_content_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body("sorry, no data here")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).extract(&report()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
        assert!(!err.is_transient());
    }
}
