//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url：OpenAI、vLLM、Gemini 兼容层等）。
//! 请求体按 function calling 格式手工构造后以 `create_byot` 发送：图片以 image_url 片段内联，
//! 动作目录转为 tools，`tool_choice` 固定为 auto。

use std::collections::HashSet;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{Completion, LlmClient, LlmError};
use crate::memory::{Message, Role, ToolCall};
use crate::tools::ActionSpec;

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    request_timeout: Duration,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| {
                tracing::warn!("No API key configured, using placeholder");
                "sk-placeholder".to_string()
            });

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: None,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 构造 chat/completions 请求体
    pub fn build_request(&self, messages: &[Message], actions: &[ActionSpec]) -> Value {
        let tools: Vec<Value> = actions
            .iter()
            .map(|a| {
                json!({
                    "type": "function",
                    "function": {
                        "name": a.name,
                        "description": a.description,
                        "parameters": a.parameters,
                    }
                })
            })
            .collect();

        let mut request = json!({
            "model": self.model,
            "messages": to_openai_messages(messages),
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            request["tools"] = Value::Array(tools);
            request["tool_choice"] = json!("auto");
        }
        if let Some(max_tokens) = self.max_tokens {
            request["max_tokens"] = json!(max_tokens);
        }
        request
    }
}

/// Message 转为 API 格式。
/// 裁剪视图可能丢掉发起调用的助手消息，此时对应的动作结果降级为普通用户文本，避免孤立的 tool 消息。
fn to_openai_messages(messages: &[Message]) -> Vec<Value> {
    let call_ids: HashSet<&str> = messages
        .iter()
        .filter_map(|m| m.tool_call.as_ref().map(|c| c.id.as_str()))
        .collect();

    messages
        .iter()
        .map(|m| match m.role {
            Role::System => json!({"role": "system", "content": m.content}),
            Role::User => match &m.image {
                Some(url) => json!({
                    "role": "user",
                    "content": [
                        {"type": "text", "text": m.content},
                        {"type": "image_url", "image_url": {"url": url}},
                    ]
                }),
                None => json!({"role": "user", "content": m.content}),
            },
            Role::Assistant => match &m.tool_call {
                Some(call) => json!({
                    "role": "assistant",
                    "content": if m.content.is_empty() { Value::Null } else { json!(m.content) },
                    "tool_calls": [{
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": call.args.to_string()},
                    }]
                }),
                None => json!({"role": "assistant", "content": m.content}),
            },
            Role::Tool => match m.tool_call_id.as_deref() {
                Some(id) if call_ids.contains(id) => {
                    json!({"role": "tool", "tool_call_id": id, "content": m.content})
                }
                _ => json!({"role": "user", "content": format!("Action result: {}", m.content)}),
            },
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// 解析响应：无法解析为 JSON 的参数原样保留为字符串，由动作解析报告参数错误
fn parse_completion(response: Value) -> Result<Completion, LlmError> {
    let response: ChatResponse =
        serde_json::from_value(response).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, call)| {
            let args = if call.function.arguments.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments))
            };
            ToolCall {
                id: if call.id.is_empty() {
                    format!("call_{i}")
                } else {
                    call.id
                },
                name: call.function.name,
                args,
            }
        })
        .collect();

    Ok(Completion {
        text: message.content.filter(|t| !t.trim().is_empty()),
        tool_calls,
    })
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        actions: &[ActionSpec],
    ) -> Result<Completion, LlmError> {
        let request = self.build_request(messages, actions);
        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let response: Value = tokio::time::timeout(
            self.request_timeout,
            self.client.chat().create_byot(request),
        )
        .await
        .map_err(|_| LlmError::Request(format!("timed out after {:?}", self.request_timeout)))?
        .map_err(|e| LlmError::Request(e.to_string()))?;

        parse_completion(response)
    }
}
