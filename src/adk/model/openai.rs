// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat-completions client
//!
//! Mistral and Groq both expose this protocol, so a single client serves
//! every built-in provider. Transient failures are retried here, inside
//! the capability, up to `max_retries` times.

use super::{role, Content, GenerationConfig, Model, Part};
use crate::adk::error::{ModelError, SqlAgentError};
use crate::adk::tool::{result_text, Tool};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const BASE_BACKOFF_MS: u64 = 500;

/// How tool-call ids are written into requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolCallIds {
    /// Sent as stored
    #[default]
    Verbatim,
    /// Exactly nine ASCII letters or digits (Mistral)
    Alphanumeric9,
}

impl ToolCallIds {
    /// Wire form of `id`. Deterministic, so a call and its result keep matching.
    pub fn format(self, id: &str) -> String {
        match self {
            Self::Verbatim => id.to_string(),
            Self::Alphanumeric9 if is_alphanumeric9(id) => id.to_string(),
            Self::Alphanumeric9 => alphanumeric9(id),
        }
    }
}

fn is_alphanumeric9(id: &str) -> bool {
    id.len() == 9 && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn alphanumeric9(id: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    // FNV-1a, stable across runs
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in id.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (0..9)
        .map(|_| {
            let c = ALPHABET[(hash % 62) as usize] as char;
            hash /= 62;
            c
        })
        .collect()
}

/// Outcome of a single HTTP attempt
enum Attempt {
    Done(Value),
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
    Fatal(SqlAgentError),
}

/// Chat-completions model for any OpenAI-compatible endpoint
pub struct ChatCompletionsModel {
    client: Client,
    provider: String,
    api_key: String,
    model_name: String,
    base_url: String,
    defaults: GenerationConfig,
    max_retries: u32,
    tool_call_ids: ToolCallIds,
}

impl ChatCompletionsModel {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider: provider.into(),
            api_key: api_key.into(),
            model_name: model_name.into(),
            base_url: base_url.into(),
            defaults: GenerationConfig::default(),
            max_retries: 0,
            tool_call_ids: ToolCallIds::Verbatim,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.defaults.temperature = Some(temperature);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_tool_call_ids(mut self, tool_call_ids: ToolCallIds) -> Self {
        self.tool_call_ids = tool_call_ids;
        self
    }

    /// Convert internal Content to chat-completions messages.
    ///
    /// A tool-result message expands into one `tool` message per result.
    fn content_to_messages(content: &Content, ids: ToolCallIds) -> Vec<Value> {
        let responses: Vec<Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionResponse { id, response, .. } => Some(json!({
                    "role": "tool",
                    "tool_call_id": ids.format(id),
                    "content": result_text(response)
                })),
                _ => None,
            })
            .collect();
        if !responses.is_empty() {
            return responses;
        }

        let role = match content.role.as_str() {
            role::MODEL => "assistant",
            other => other,
        };

        let mut tool_calls = Vec::new();
        let mut text_content = String::new();
        for part in &content.parts {
            match part {
                Part::Text { text } => text_content.push_str(text),
                Part::FunctionCall { id, name, args } => {
                    tool_calls.push(json!({
                        "id": ids.format(id),
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": args.to_string()
                        }
                    }));
                }
                Part::FunctionResponse { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            vec![json!({ "role": role, "content": text_content })]
        } else {
            vec![json!({
                "role": role,
                "content": if text_content.is_empty() { Value::Null } else { json!(text_content) },
                "tool_calls": tool_calls
            })]
        }
    }

    /// Convert tools to the function-declaration format
    fn tools_to_wire_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    /// Parse a chat-completions response into Content
    fn parse_response(response: &Value) -> Result<Content, ModelError> {
        let message = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .map(|choice| &choice["message"])
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let mut parts = Vec::new();

        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::text(content));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                let id = tc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let name = tc["function"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let args = match &tc["function"]["arguments"] {
                    Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
                        log::warn!("Unparseable arguments for tool call {}: {}", name, e);
                        json!({})
                    }),
                    Value::Object(_) => tc["function"]["arguments"].clone(),
                    _ => json!({}),
                };
                parts.push(Part::FunctionCall { id, name, args });
            }
        }

        Ok(Content {
            role: role::MODEL.to_string(),
            parts,
        })
    }

    fn request_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Value {
        let messages: Vec<Value> = history
            .iter()
            .flat_map(|content| Self::content_to_messages(content, self.tool_call_ids))
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        let cfg = config.unwrap_or(&self.defaults);
        if let Some(temp) = cfg.temperature.or(self.defaults.temperature) {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = cfg.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = cfg.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_to_wire_format(tools));
                body["tool_choice"] = json!("auto");
            }
        }

        body
    }

    async fn attempt(&self, body: &Value) -> Attempt {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = match self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return Attempt::Transient {
                    message: e.to_string(),
                    retry_after: None,
                }
            }
            Err(e) => return Attempt::Fatal(e.into()),
        };

        let status = resp.status();
        if status.is_success() {
            return match resp.json::<Value>().await {
                Ok(json) => Attempt::Done(json),
                Err(e) => Attempt::Fatal(e.into()),
            };
        }

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = resp.text().await.unwrap_or_default();

        if is_transient(status) {
            Attempt::Transient {
                message: format!("HTTP {}: {}", status, text),
                retry_after,
            }
        } else {
            Attempt::Fatal(SqlAgentError::api(
                &self.provider,
                format!("HTTP {}: {}", status, text),
            ))
        }
    }
}

/// Rate limits and server-side failures are worth retrying
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(1 << attempt.min(6)))
}

#[async_trait]
impl Model for ChatCompletionsModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, Box<dyn Error + Send + Sync>> {
        let body = self.request_body(history, config, tools);
        log::debug!(
            "{} request body: {}",
            self.provider,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let mut attempt = 0;
        loop {
            match self.attempt(&body).await {
                Attempt::Done(resp_json) => {
                    log::debug!("{} response: {}", self.provider, resp_json);
                    return Ok(Self::parse_response(&resp_json)?);
                }
                Attempt::Fatal(e) => return Err(e.into()),
                Attempt::Transient {
                    message,
                    retry_after,
                } => {
                    if attempt >= self.max_retries {
                        return Err(ModelError::RetriesExhausted {
                            provider: self.provider.clone(),
                            attempts: attempt + 1,
                            message,
                        }
                        .into());
                    }
                    let delay = retry_after.unwrap_or_else(|| backoff(attempt));
                    log::warn!(
                        "{} transient failure ({}), retry {}/{} in {:?}",
                        self.provider,
                        message,
                        attempt + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> ChatCompletionsModel {
        ChatCompletionsModel::new("mistral", "http://localhost", "key", "codestral-latest")
            .with_temperature(0.0)
    }

    #[test]
    fn test_user_message() {
        let msgs =
            ChatCompletionsModel::content_to_messages(&Content::user("Hello"), ToolCallIds::Verbatim);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["content"], "Hello");
    }

    #[test]
    fn test_assistant_tool_call_keeps_id() {
        let content = Content::tool_call("tool_initial", "sql_db_list_tables", json!({}));
        let msgs = ChatCompletionsModel::content_to_messages(&content, ToolCallIds::Verbatim);
        assert_eq!(msgs[0]["role"], "assistant");
        assert!(msgs[0]["content"].is_null());
        assert_eq!(msgs[0]["tool_calls"][0]["id"], "tool_initial");
        assert_eq!(msgs[0]["tool_calls"][0]["function"]["arguments"], "{}");
    }

    #[test]
    fn test_tool_results_expand_per_call() {
        let content = Content::new(
            role::TOOL,
            vec![
                Part::FunctionResponse {
                    id: "a".to_string(),
                    name: "sql_db_schema".to_string(),
                    response: json!("CREATE TABLE a (x INT)"),
                },
                Part::FunctionResponse {
                    id: "b".to_string(),
                    name: "sql_db_schema".to_string(),
                    response: json!({"error": "nope"}),
                },
            ],
        );
        let msgs = ChatCompletionsModel::content_to_messages(&content, ToolCallIds::Verbatim);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["role"], "tool");
        assert_eq!(msgs[0]["tool_call_id"], "a");
        assert_eq!(msgs[0]["content"], "CREATE TABLE a (x INT)");
        assert_eq!(msgs[1]["tool_call_id"], "b");
        assert_eq!(msgs[1]["content"], r#"{"error":"nope"}"#);
    }

    #[test]
    fn test_alphanumeric9_ids_pair_call_and_result() {
        let history = [
            Content::tool_call("tool_initial", "sql_db_list_tables", json!({})),
            Content::tool_result("tool_initial", "sql_db_list_tables", json!("customers")),
        ];
        let body = model()
            .with_tool_call_ids(ToolCallIds::Alphanumeric9)
            .request_body(&history, None, None);

        let call_id = body["messages"][0]["tool_calls"][0]["id"].as_str().unwrap();
        assert_eq!(call_id.len(), 9);
        assert!(call_id.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_eq!(body["messages"][1]["tool_call_id"], call_id);
        assert_ne!(
            ToolCallIds::Alphanumeric9.format("call_1"),
            ToolCallIds::Alphanumeric9.format("call_2")
        );
    }

    #[test]
    fn test_alphanumeric9_keeps_valid_ids() {
        assert_eq!(ToolCallIds::Alphanumeric9.format("D681PevKs"), "D681PevKs");
        assert_eq!(ToolCallIds::Verbatim.format("tool_initial"), "tool_initial");
    }

    #[test]
    fn test_request_body_uses_default_temperature() {
        let body = model().request_body(&[Content::user("q")], None, None);
        assert_eq!(body["model"], "codestral-latest");
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let response = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "```sql\nSELECT 1;\n```"}
            }]
        });
        let content = ChatCompletionsModel::parse_response(&response).unwrap();
        assert_eq!(content.role, role::MODEL);
        assert_eq!(content.text(), "```sql\nSELECT 1;\n```");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "sql_db_schema",
                            "arguments": "{\"table_names\": \"customers\"}"
                        }
                    }]
                }
            }]
        });
        let content = ChatCompletionsModel::parse_response(&response).unwrap();
        let calls = content.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_123");
        assert_eq!(calls[0].args["table_names"], "customers");
    }

    #[test]
    fn test_parse_tool_call_without_id_gets_one() {
        let response = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{"function": {"name": "sql_db_schema", "arguments": "{}"}}]
                }
            }]
        });
        let content = ChatCompletionsModel::parse_response(&response).unwrap();
        assert!(content.function_calls()[0].id.starts_with("call_"));
    }

    #[test]
    fn test_parse_empty_choices_is_invalid() {
        let err = ChatCompletionsModel::parse_response(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
        assert!(!is_transient(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_backoff_grows() {
        assert_eq!(backoff(0), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(2000));
        assert!(backoff(20) <= Duration::from_millis(500 * 64));
    }
}
