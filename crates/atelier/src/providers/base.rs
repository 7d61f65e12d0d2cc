use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Base trait for hosted model backends (Gemini, OpenAI-compatible, etc).
///
/// A provider is stateless: the session owns the transcript and replays it on
/// every call. The response message may carry plain text, tool requests, or
/// both; errors propagate and are fatal to the round that triggered them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message given the system instruction, the wire
    /// transcript so far, and the declared tools.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)>;
}
