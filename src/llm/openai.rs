//! OpenAI-compatible chat completions client
//!
//! Uses a long-lived reqwest::Client for connection pooling. Every request is
//! bounded by the configured timeout; nothing is retried.

use super::{ChoiceSchema, CompletionService};
use crate::config::LlmConfig;
use crate::error::RouterError;
use crate::models::ChatMessage;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// Reusable completion client (connection-pooled)
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RouterError::ConfigError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout,
        })
    }

    fn build_request(&self, prompt: &[ChatMessage], schema: Option<&ChoiceSchema>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: prompt
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: schema.map(ResponseFormat::for_schema),
        }
    }

    /// Post one request and return the first choice's content
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            structured = request.response_format.is_some(),
            "Calling chat completions"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                if e.is_timeout() {
                    RouterError::Timeout(self.timeout)
                } else {
                    RouterError::LlmError(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RouterError::Timeout(self.timeout)
            } else {
                RouterError::LlmError(format!("failed to read response: {}", e))
            }
        })?;

        if !status.is_success() {
            error!(status = %status, "Completion service error response: {}", body);
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            RouterError::LlmError(format!("unparseable response: {} | raw={}", e, body))
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RouterError::LlmError("no choices in response".to_string()))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(RouterError::LlmError(format!("model refused: {}", refusal)));
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RouterError::LlmError("empty response content".to_string()))?;

        info!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "Completion received"
        );

        Ok(content)
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn generate(&self, prompt: &[ChatMessage]) -> Result<String> {
        let request = self.build_request(prompt, None);
        self.complete(&request).await
    }

    async fn choose(&self, prompt: &[ChatMessage], schema: &ChoiceSchema) -> Result<String> {
        let request = self.build_request(prompt, Some(schema));
        let content = self.complete(&request).await?;
        extract_choice(&content, schema.field)
    }
}

fn classify_status(status: StatusCode, body: &str) -> RouterError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        401 | 403 => RouterError::AuthError(message),
        429 => RouterError::RateLimited(message),
        500..=599 => RouterError::LlmError(format!("server error {}: {}", status, message)),
        _ => RouterError::LlmError(format!("HTTP {}: {}", status, message)),
    }
}

/// Pull `field` out of a structured answer. Tolerates a markdown code fence;
/// the value itself is returned untouched for the caller to validate.
fn extract_choice(content: &str, field: &str) -> Result<String> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        RouterError::LlmError(format!(
            "unparseable structured response: {} | raw={}",
            e, content
        ))
    })?;

    json.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            RouterError::LlmError(format!(
                "structured response missing string field {:?} | raw={}",
                field, content
            ))
        })
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    description: &'static str,
    strict: bool,
    schema: Value,
}

impl ResponseFormat {
    fn for_schema(schema: &ChoiceSchema) -> Self {
        let mut properties = serde_json::Map::new();
        properties.insert(
            schema.field.to_string(),
            json!({
                "type": "string",
                "enum": schema.options,
                "description": schema.field_description,
            }),
        );

        Self {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: schema.name,
                description: schema.description,
                strict: true,
                schema: json!({
                    "type": "object",
                    "properties": properties,
                    "required": [schema.field],
                    "additionalProperties": false,
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};

    const ROUTE_SCHEMA: ChoiceSchema = ChoiceSchema {
        name: "InitialRouter",
        description: "Route the message",
        field: "next_node",
        field_description: "receptionist or classifier",
        options: &["receptionist", "classifier"],
    };

    fn completion(content: &str) -> Value {
        json!({
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        })
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn client_for(base_url: String) -> OpenAiClient {
        let config = LlmConfig::new("sk-test")
            .with_base_url(base_url)
            .with_timeout(Duration::from_millis(500));
        OpenAiClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let client = client_for("http://localhost:1/v1".to_string());
        let prompt = vec![
            ChatMessage::system("You route messages"),
            ChatMessage::user("Hi there!"),
        ];

        let plain = serde_json::to_value(client.build_request(&prompt, None)).unwrap();
        assert_eq!(plain["model"], "gpt-4o-mini");
        assert_eq!(plain["max_tokens"], 300);
        assert_eq!(plain["messages"][0]["role"], "system");
        assert_eq!(plain["messages"][1]["content"], "Hi there!");
        assert!(plain.get("response_format").is_none());

        let structured =
            serde_json::to_value(client.build_request(&prompt, Some(&ROUTE_SCHEMA))).unwrap();
        let format = &structured["response_format"];
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["strict"], true);
        assert_eq!(
            format["json_schema"]["schema"]["properties"]["next_node"]["enum"],
            json!(["receptionist", "classifier"])
        );
        assert_eq!(format["json_schema"]["schema"]["required"], json!(["next_node"]));
    }

    #[test]
    fn test_extract_choice() {
        assert_eq!(
            extract_choice(r#"{"next_node":"classifier"}"#, "next_node").unwrap(),
            "classifier"
        );
        assert_eq!(
            extract_choice("```json\n{\"next_node\": \"receptionist\"}\n```", "next_node").unwrap(),
            "receptionist"
        );
        // Out-of-set values pass through untouched for the caller to reject
        assert_eq!(
            extract_choice(r#"{"next_node":"billing"}"#, "next_node").unwrap(),
            "billing"
        );
        assert!(extract_choice("receptionist", "next_node").is_err());
        assert!(extract_choice(r#"{"other":"x"}"#, "next_node").is_err());
        assert!(extract_choice(r#"{"next_node":3}"#, "next_node").is_err());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let config = LlmConfig::new("   ");
        assert!(matches!(
            OpenAiClient::new(&config),
            Err(RouterError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_token() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(_body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer sk-test");
                if authorized {
                    (axum::http::StatusCode::OK, Json(completion("Hello! How can I help?")))
                } else {
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "error": { "message": "bad key" } })),
                    )
                }
            }),
        );
        let client = client_for(spawn_server(router).await);

        let reply = client.generate(&[ChatMessage::user("Hi")]).await.unwrap();
        assert_eq!(reply, "Hello! How can I help?");
    }

    #[tokio::test]
    async fn test_choose_round_trip() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let options = &body["response_format"]["json_schema"]["schema"]["properties"]
                    ["next_node"]["enum"];
                assert_eq!(options, &json!(["receptionist", "classifier"]));
                Json(completion(r#"{"next_node":"classifier"}"#))
            }),
        );
        let client = client_for(spawn_server(router).await);

        let value = client
            .choose(&[ChatMessage::user("Why was I charged twice?")], &ROUTE_SCHEMA)
            .await
            .unwrap();
        assert_eq!(value, "classifier");
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let router = Router::new()
            .route(
                "/auth/v1/chat/completions",
                post(|| async {
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "error": { "message": "invalid api key" } })),
                    )
                }),
            )
            .route(
                "/quota/v1/chat/completions",
                post(|| async {
                    (
                        axum::http::StatusCode::TOO_MANY_REQUESTS,
                        Json(json!({ "error": { "message": "slow down" } })),
                    )
                }),
            )
            .route(
                "/down/v1/chat/completions",
                post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
            );
        let base = spawn_server(router).await;
        let root = base.trim_end_matches("/v1");
        let prompt = [ChatMessage::user("hi")];

        let err = client_for(format!("{}/auth/v1", root))
            .generate(&prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::AuthError(ref m) if m == "invalid api key"));

        let err = client_for(format!("{}/quota/v1", root))
            .generate(&prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::RateLimited(_)));

        let err = client_for(format!("{}/down/v1", root))
            .generate(&prompt)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::LlmError(ref m) if m.contains("upstream down")));
    }

    #[tokio::test]
    async fn test_empty_choices_is_failure() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let client = client_for(spawn_server(router).await);

        let err = client.generate(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(err.is_external_failure());
    }

    #[tokio::test]
    async fn test_unparseable_body_is_llm_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { "<html>gateway</html>" }),
        );
        let client = client_for(spawn_server(router).await);

        let err = client.generate(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, RouterError::LlmError(ref m) if m.contains("unparseable")));
        assert!(err.is_external_failure());
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(completion("too late"))
            }),
        );
        let client = client_for(spawn_server(router).await);

        let err = client.generate(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, RouterError::Timeout(d) if d == Duration::from_millis(500)));
    }
}
