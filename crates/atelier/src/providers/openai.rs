use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{normalize_arguments, sanitize_function_name};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = data.get("usage");
        let count = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(|v| v.as_i64())
                .map(|v| v as i32)
        };
        Usage::new(
            count("prompt_tokens"),
            count("completion_tokens"),
            count("total_tokens"),
        )
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!(
                "Request failed: {}\n{}",
                status,
                response.text().await.unwrap_or_default()
            )),
        }
    }
}

/// Convert the wire transcript to the chat-completions message spec.
fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::new();

    for message in messages {
        match message.role {
            Role::User => {
                // Tool responses ride on user turns internally but become
                // `tool` role entries on the wire.
                let mut parts = Vec::new();
                for content in &message.content {
                    match content {
                        MessageContent::Text(text) if !text.text.is_empty() => {
                            parts.push(json!({"type": "text", "text": text.text}));
                        }
                        MessageContent::Image(image) => {
                            parts.push(json!({
                                "type": "image_url",
                                "image_url": {
                                    "url": format!("data:{};base64,{}", image.mime_type, image.data)
                                }
                            }));
                        }
                        MessageContent::ToolResponse(response) => {
                            spec.push(json!({
                                "role": "tool",
                                "content": response.result,
                                "tool_call_id": response.id,
                            }));
                        }
                        _ => {}
                    }
                }
                if !parts.is_empty() {
                    spec.push(json!({"role": "user", "content": parts}));
                }
            }
            Role::Assistant => {
                let mut converted = json!({"role": "assistant"});
                let text = message.text();
                if !text.is_empty() {
                    converted["content"] = json!(text);
                }
                let tool_calls: Vec<Value> = message
                    .tool_requests()
                    .iter()
                    .map(|request| {
                        json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&request.call.name),
                                "arguments": request.call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                if !tool_calls.is_empty() {
                    converted["tool_calls"] = json!(tool_calls);
                }
                spec.push(converted);
            }
        }
    }

    spec
}

fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

fn response_to_message(response: &Value) -> Result<Message> {
    let choice = response
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("No message in OpenAI response"))?;

    let mut message = Message::assistant();
    if let Some(text) = choice.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(calls) = choice.get("tool_calls").and_then(|v| v.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let function = call
                .get("function")
                .ok_or_else(|| anyhow!("tool_call without a function"))?;
            let name = function
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("tool_call function without a name"))?;
            let arguments =
                normalize_arguments(function.get("arguments").cloned().unwrap_or(json!({})));
            message = message.with_tool_request(id, ToolCall::new(name, arguments));
        }
    }

    Ok(message)
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let mut messages_array = vec![json!({"role": "system", "content": system})];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
        });
        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools));
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}
