use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::errors::{ToolError, ToolResult};

const CONTENT_LIMIT: usize = 4000;

lazy_static! {
    // Strip whole script/style elements first, then any remaining tags.
    static ref SCRIPT_OR_STYLE: Regex =
        Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").expect("valid regex");
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

/// Fetches a page and reduces it to readable text for the model.
pub struct WebExplorer {
    client: Client,
}

impl WebExplorer {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("atelier-agent/0.1")
            .build()?;
        Ok(WebExplorer { client })
    }

    pub async fn read_url(&self, url: &str) -> ToolResult<String> {
        let parsed = Url::parse(url)
            .map_err(|e| ToolError::InvalidParameters(format!("'{}' is not a valid URL: {}", url, e)))?;

        let response = self.client.get(parsed).send().await.map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "An exception occurred while trying to fetch the URL content. Message: {}",
                e
            ))
        })?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Failed to fetch URL. Server responded with status {}. The website might be down or blocking access.",
                response.status().as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let text = extract_text(&html);

        if text.is_empty() {
            return Err(ToolError::ExecutionFailed(
                "Could not extract any readable content from the URL. It might be a video, an image, or a page that relies heavily on JavaScript.".to_string(),
            ));
        }

        let summary = if text.len() > CONTENT_LIMIT {
            let mut cut = CONTENT_LIMIT;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &text[..cut])
        } else {
            text
        };

        Ok(format!(
            "Successfully extracted content from {}:\n\n{}",
            url, summary
        ))
    }
}

impl Default for WebExplorer {
    fn default() -> Self {
        Self::new().expect("failed to build HTTP client")
    }
}

fn extract_text(html: &str) -> String {
    let without_scripts = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_scripts, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}
