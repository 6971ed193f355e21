use crate::config::ProviderAdapterConfig;
use crate::traits::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Adapter for any backend speaking the OpenAI chat completions protocol.
pub struct OpenAICompatibleAdapter {
    client: Client,
    config: ProviderAdapterConfig,
    api_key: Option<String>,
}

impl OpenAICompatibleAdapter {
    pub fn new(config: ProviderAdapterConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.tunables.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let api_key = config.credentials.api_key();

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &ProviderAdapterConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send_once(&self, body: &Value) -> Result<ChatResponse, ProviderError> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        parse_response(&json)
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.config.tunables.timeout_seconds)
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatibleAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn supports_model(&self, model: &str) -> bool {
        self.config.match_model(model).is_some()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = request_body(&self.config, request);
        let retries = self.config.tunables.retry_count;

        let mut attempt = 0;
        loop {
            debug!(
                provider = self.id(),
                model = request.model.as_str(),
                attempt,
                "Sending chat request"
            );
            match self.send_once(&body).await {
                Err(e) if e.is_transport() && attempt < retries => {
                    attempt += 1;
                    warn!(
                        provider = self.id(),
                        attempt,
                        error = %e,
                        "Retrying after transport error"
                    );
                }
                other => return other,
            }
        }
    }
}

/// Request body in OpenAI chat completions format. Per-request values win
/// over configured tunables.
pub fn request_body(config: &ProviderAdapterConfig, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });

    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
    }
    if let Some(max_tokens) = request.max_tokens.or(config.tunables.max_tokens) {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature.or(config.tunables.temperature) {
        body["temperature"] = json!(temperature);
    }
    body
}

fn wire_message(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role,
        "content": message.content,
    });
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(id);
    }
    wire
}

pub fn status_error(status: StatusCode, body: String) -> ProviderError {
    let detail = format!("{}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        _ => ProviderError::Api(detail),
    }
}

pub fn parse_response(json: &Value) -> Result<ChatResponse, ProviderError> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let message = &choice["message"];
    let content = message["content"].as_str().map(|s| s.to_string());
    let finish_reason = choice["finish_reason"]
        .as_str()
        .unwrap_or("stop")
        .to_string();

    let tool_calls = match message["tool_calls"].as_array() {
        Some(calls) => calls
            .iter()
            .map(parse_tool_call)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ChatResponse {
        content,
        tool_calls,
        finish_reason,
    })
}

fn parse_tool_call(call: &Value) -> Result<ToolCall, ProviderError> {
    let name = call["function"]["name"]
        .as_str()
        .ok_or_else(|| ProviderError::Parse("Tool call without function name".to_string()))?;
    let arguments = match &call["function"]["arguments"] {
        Value::String(raw) if raw.trim().is_empty() => json!({}),
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
            ProviderError::Parse(format!("Invalid arguments for tool '{}': {}", name, e))
        })?,
        Value::Null => json!({}),
        other => other.clone(),
    };

    Ok(ToolCall {
        id: call["id"].as_str().unwrap_or_default().to_string(),
        name: name.to_string(),
        arguments,
    })
}
