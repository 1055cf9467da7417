//! Ollama chat provider.
//!
//! Speaks the non-streaming `/api/chat` endpoint with function-calling tool
//! definitions. Ollama does not assign tool call ids, so they are generated
//! here.

use std::time::Duration;

use async_trait::async_trait;
use deepagent_types::{Message, ToolCall};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmError, LlmResult, ModelClient, ModelReply};
use crate::tools::ToolDescriptor;

/// Connection and sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Caps generated tokens (`num_predict`) when set.
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: None,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> LlmResult<ModelReply> {
        let request = build_request(&self.config, messages, tools);
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "ollama chat request"
        );

        let response = self
            .client
            .post(self.endpoint("api/chat"))
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("{}: {}", e, body)))?;
        Ok(into_reply(parsed))
    }

    async fn is_available(&self) -> bool {
        matches!(
            self.client.get(self.endpoint("api/tags")).send().await,
            Ok(r) if r.status().is_success()
        )
    }
}

fn map_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_connect() || e.is_timeout() {
        LlmError::Unavailable(e.to_string())
    } else {
        LlmError::Network(e.to_string())
    }
}

/// Ollama reports failures as `{"error": "..."}`.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    stream: bool,
    options: WireOptions,
}

#[derive(Debug, Serialize)]
struct WireOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

fn build_request<'a>(
    config: &'a OllamaConfig,
    messages: &[Message],
    tools: &'a [ToolDescriptor],
) -> ChatRequest<'a> {
    ChatRequest {
        model: &config.model,
        messages: messages.iter().map(to_wire).collect(),
        tools: tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.input_schema,
                },
            })
            .collect(),
        stream: false,
        options: WireOptions {
            temperature: config.temperature,
            num_predict: config.max_tokens,
        },
    }
}

fn to_wire(message: &Message) -> WireMessage {
    WireMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| WireToolCall {
                function: WireFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect(),
    }
}

fn into_reply(response: ChatResponse) -> ModelReply {
    let message = response.message;
    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            // Some models send arguments as a JSON string rather than an object.
            let arguments = match call.function.arguments {
                serde_json::Value::String(s) => {
                    serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
                }
                other => other,
            };
            ToolCall::new(
                format!("call_{}", uuid::Uuid::new_v4().simple()),
                call.function.name,
                arguments,
            )
        })
        .collect();
    ModelReply {
        content: message.content,
        tool_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape() {
        let config = OllamaConfig::new("ministral-3:latest").with_temperature(0.0);
        let tools = vec![ToolDescriptor {
            name: "ls".into(),
            description: "List files".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }];
        let call = ToolCall::new("c1", "ls", json!({"path": "/"}));
        let messages = vec![
            Message::system("be brief"),
            Message::user("what files?"),
            Message::assistant_with_calls("", vec![call]),
            Message::tool_result("c1", "/a.md"),
        ];

        let value = serde_json::to_value(build_request(&config, &messages, &tools)).unwrap();
        assert_eq!(value["model"], "ministral-3:latest");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["temperature"], 0.0);
        assert!(value["options"].get("num_predict").is_none());
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "ls");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][2]["tool_calls"][0]["function"]["arguments"]["path"], "/");
        assert_eq!(value["messages"][3]["role"], "tool");
        assert!(value["messages"][1].get("tool_calls").is_none());
    }

    #[test]
    fn reply_generates_call_ids() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "m",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "read_file", "arguments": {"path": "/a.md"}}},
                    {"function": {"name": "grep", "arguments": "{\"pattern\": \"x\"}"}}
                ]
            },
            "done": true
        }))
        .unwrap();

        let reply = into_reply(response);
        assert_eq!(reply.tool_calls.len(), 2);
        assert_ne!(reply.tool_calls[0].id, reply.tool_calls[1].id);
        assert!(reply.tool_calls[0].id.starts_with("call_"));
        assert_eq!(reply.tool_calls[0].arguments["path"], "/a.md");
        assert_eq!(reply.tool_calls[1].arguments["pattern"], "x");
    }

    #[test]
    fn error_bodies() {
        assert_eq!(error_message(r#"{"error": "model 'x' not found"}"#), "model 'x' not found");
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let client = OllamaClient::new(
            OllamaConfig::new("m")
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let err = client.complete(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)), "{err:?}");
        assert!(!client.is_available().await);
    }
}
