use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::base::{Provider, Usage};
use super::configs::GeminiProviderConfig;
use super::utils::normalize_arguments;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let metadata = data.get("usageMetadata");
        let count = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .and_then(|v| v.as_i64())
                .map(|v| v as i32)
        };
        Usage::new(
            count("promptTokenCount"),
            count("candidatesTokenCount"),
            count("totalTokenCount"),
        )
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.host.trim_end_matches('/'),
            self.config.model,
            self.config.api_key,
        );

        let response = self.client.post(&url).json(&payload).send().await?;

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

/// Convert the wire transcript to Gemini `contents`.
///
/// Tool requests become `functionCall` parts on a model turn and tool
/// responses become `functionResponse` parts on a user turn, which is the
/// pairing the API validates.
fn messages_to_contents(messages: &[Message]) -> Vec<Value> {
    let mut contents = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };

        let mut parts = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        parts.push(json!({"text": text.text}));
                    }
                }
                MessageContent::Image(image) => {
                    parts.push(json!({
                        "inlineData": {
                            "mimeType": image.mime_type,
                            "data": image.data,
                        }
                    }));
                }
                MessageContent::ToolRequest(request) => {
                    parts.push(json!({
                        "functionCall": {
                            "name": request.call.name,
                            "args": request.call.arguments,
                        }
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    parts.push(json!({
                        "functionResponse": {
                            "name": response.name,
                            "response": {"result": response.result},
                        }
                    }));
                }
            }
        }

        if !parts.is_empty() {
            contents.push(json!({"role": role, "parts": parts}));
        }
    }

    contents
}

fn tools_to_declarations(tools: &[Tool]) -> Value {
    json!([{
        "functionDeclarations": tools
            .iter()
            .map(|tool| json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }))
            .collect::<Vec<_>>()
    }])
}

/// Parse a generateContent response into a wire message. Gemini does not
/// assign call ids, so each parsed functionCall gets a fresh uuid.
fn response_to_message(response: &Value) -> Result<Message> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("No content parts in Gemini response"))?;

    let mut message = Message::assistant();
    for part in parts {
        if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
            message = message.with_text(text);
        }
        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("functionCall part without a name"))?;
            let args = normalize_arguments(call.get("args").cloned().unwrap_or(json!({})));
            message = message
                .with_tool_request(Uuid::new_v4().to_string(), ToolCall::new(name, args));
        }
    }

    Ok(message)
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let mut payload = json!({
            "contents": messages_to_contents(messages),
        });

        if !system.is_empty() {
            payload["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if !tools.is_empty() {
            payload["tools"] = tools_to_declarations(tools);
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Gemini API error: {}", error));
        }

        let message = response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(GeminiProviderConfig {
            host: server.uri(),
            api_key: "test-key".to_string(),
            model: "gemini-test".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_plain_text() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Hello there"}]}}],
                "usageMetadata": {
                    "promptTokenCount": 12,
                    "candidatesTokenCount": 3,
                    "totalTokenCount": 15
                }
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let transcript = vec![Message::user().with_text("Hi")];
        let (message, usage) = provider.complete("be nice", &transcript, &[]).await?;

        assert_eq!(message.text(), "Hello there");
        assert!(message.tool_requests().is_empty());
        assert_eq!(usage.total_tokens, Some(15));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_parses_function_calls() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"functionCall": {"name": "readFile", "args": {"fileName": "notes.txt"}}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let transcript = vec![Message::user().with_text("read my notes")];
        let (message, _) = provider.complete("", &transcript, &[]).await?;

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].call.name, "readFile");
        assert_eq!(requests[0].call.arguments["fileName"], "notes.txt");
        assert!(!requests[0].id.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_server_errors_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let transcript = vec![Message::user().with_text("Hi")];
        let result = provider.complete("", &transcript, &[]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_transcript_conversion_pairs_tool_turns() {
        let transcript = vec![
            Message::user().with_text("list"),
            Message::assistant().with_tool_request("1", ToolCall::new("listFiles", json!({}))),
            Message::user().with_tool_response("1", "listFiles", "Files available:\n- a.txt"),
        ];

        let contents = messages_to_contents(&transcript);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["name"],
            "listFiles"
        );
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"],
            "Files available:\n- a.txt"
        );
    }
}
