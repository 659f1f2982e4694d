//! OpenAI-compatible model adapter.
//!
//! Works with OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, Together,
//! and any other endpoint that follows the OpenAI chat completions
//! contract. The single bundled adapter for this core.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use turnloom_domain::{BoxStream, ContextEntry, Error, ModelCapabilities, ProviderConfig, Result, Role};
use turnloom_plugins::ModelPlugin;

use crate::auth::AuthRotator;
use crate::util::from_reqwest;

pub struct OpenAiCompatModelPlugin {
    id: String,
    base_url: String,
    auth: Arc<AuthRotator>,
    default_model: String,
    capabilities: ModelCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatModelPlugin {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let auth = Arc::new(AuthRotator::from_auth_config(&cfg.auth)?);
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".to_string());

        let capabilities = ModelCapabilities {
            supports_tools: true,
            supports_streaming: true,
            context_window_tokens: 128_000,
            max_output_tokens: 16_384,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth,
            default_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let entry = self.auth.next_key();
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", entry.key))
            .header("Content-Type", "application/json")
    }

    fn build_body(
        &self,
        messages: &[ContextEntry],
        model_name: &str,
        system_prompt_text: &str,
        tool_schemas: &[Value],
    ) -> Value {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !system_prompt_text.is_empty() {
            wire_messages.push(serde_json::json!({
                "role": "system",
                "content": system_prompt_text,
            }));
        }
        wire_messages.extend(messages.iter().map(entry_to_openai));

        let mut body = serde_json::json!({
            "model": model_name,
            "messages": wire_messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if !tool_schemas.is_empty() {
            let tools: Vec<Value> = tool_schemas
                .iter()
                .map(|schema| serde_json::json!({"type": "function", "function": schema}))
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

fn entry_to_openai(entry: &ContextEntry) -> Value {
    match entry.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": entry.tool_call_id.clone().unwrap_or_default(),
            "content": entry.content,
        }),
        Role::User => serde_json::json!({"role": "user", "content": entry.content}),
        Role::Assistant => {
            let mut message = serde_json::json!({"role": "assistant", "content": entry.content});
            if let Some(calls) = &entry.tool_calls {
                message["tool_calls"] = Value::Array(
                    calls
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "id": c.call_id,
                                "type": "function",
                                "function": {
                                    "name": c.tool_name,
                                    "arguments": c.arguments.to_string(),
                                },
                            })
                        })
                        .collect(),
                );
            }
            message
        }
        Role::Thinking => serde_json::json!({"role": "assistant", "content": entry.content}),
    }
}

#[async_trait]
impl ModelPlugin for OpenAiCompatModelPlugin {
    fn list_models(&self) -> Vec<String> {
        vec![self.default_model.clone()]
    }

    async fn stream(
        &self,
        messages: Vec<ContextEntry>,
        model_name: &str,
        system_prompt_text: &str,
        tool_schemas: Vec<Value>,
    ) -> Result<BoxStream<'static, turnloom_domain::ModelChunk>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&messages, model_name, system_prompt_text, &tool_schemas);

        tracing::debug!(provider = %self.id, %url, "openai_compat stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "{}: HTTP {} - {}",
                self.id,
                status.as_u16(),
                text
            )));
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data_vec))
    }

    fn capabilities(&self, _model_name: &str) -> ModelCapabilities {
        self.capabilities.clone()
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

fn parse_usage(v: &Value) -> Option<turnloom_domain::Usage> {
    Some(turnloom_domain::Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn parse_sse_data_vec(data: &str) -> Vec<turnloom_domain::ModelChunk> {
    use turnloom_domain::ModelChunk;

    if data.trim() == "[DONE]" {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    if choice.is_none() {
        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            return vec![ModelChunk::End {
                usage: Some(usage),
                finish_reason: None,
            }];
        }
        return Vec::new();
    }
    let choice = choice.unwrap();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_usage);
        return vec![ModelChunk::End {
            usage,
            finish_reason: Some(fr.to_string()),
        }];
    }

    let mut chunks = Vec::new();

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let id = tc
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let name_delta = tc
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let arguments_delta = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            chunks.push(ModelChunk::ToolCallDelta {
                id,
                index,
                name_delta,
                arguments_delta,
            });
        }
    }

    if let Some(text) = delta.get("reasoning_content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            chunks.push(ModelChunk::ThinkingText {
                content: text.to_string(),
            });
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            chunks.push(ModelChunk::AssistantText {
                content: text.to_string(),
            });
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta() {
        let data = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        let chunks = parse_sse_data_vec(data);
        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            turnloom_domain::ModelChunk::AssistantText { content } => assert_eq!(content, "hi"),
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn parses_tool_call_delta() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"add","arguments":""}}]}}]}"#;
        let chunks = parse_sse_data_vec(data);
        assert_eq!(chunks.len(), 1);
        match &chunks[0] {
            turnloom_domain::ModelChunk::ToolCallDelta { id, index, .. } => {
                assert_eq!(id.as_deref(), Some("c1"));
                assert_eq!(*index, 0);
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn finish_reason_emits_end() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let chunks = parse_sse_data_vec(data);
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], turnloom_domain::ModelChunk::End { .. }));
    }

    #[test]
    fn done_sentinel_yields_nothing() {
        assert!(parse_sse_data_vec("[DONE]").is_empty());
    }

    #[test]
    fn builds_body_with_system_prompt_and_tools() {
        let plugin = OpenAiCompatModelPlugin {
            id: "test".to_string(),
            base_url: "http://localhost".to_string(),
            auth: Arc::new(AuthRotator::from_auth_config(&turnloom_domain::AuthConfig {
                key: Some("k".into()),
                env: None,
            }).unwrap()),
            default_model: "gpt-4o".to_string(),
            capabilities: ModelCapabilities::default(),
            client: reqwest::Client::new(),
        };
        let messages = vec![ContextEntry::new(Role::User, "hi")];
        let tools = vec![serde_json::json!({"name": "add"})];
        let body = plugin.build_body(&messages, "gpt-4o", "be nice", &tools);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
    }
}
