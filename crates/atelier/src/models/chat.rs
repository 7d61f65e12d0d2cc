use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::content::ImageContent;

/// One entry of the chat history shown to the user.
///
/// History is append-only within a session, with one exception: a `Tool`
/// entry is appended while its invocation is still running (`result: None`)
/// and resolved in place once the result is available. Resolution goes
/// through the stable `id`, never a positional index, because batch
/// completion order is unspecified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "author", rename_all = "lowercase")]
pub enum ChatMessage {
    User {
        id: String,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<ImageContent>,
    },
    Agent {
        id: String,
        text: String,
    },
    Tool {
        id: String,
        name: String,
        arguments: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
}

impl ChatMessage {
    pub fn user<S: Into<String>>(text: S, images: Vec<ImageContent>) -> Self {
        ChatMessage::User {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            images,
        }
    }

    pub fn agent<S: Into<String>>(text: S) -> Self {
        ChatMessage::Agent {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    /// A tool invocation that has been requested but not yet resolved.
    /// The id is the request id, so the resolved result can be patched in
    /// by lookup.
    pub fn tool_pending<I, N>(id: I, name: N, arguments: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        ChatMessage::Tool {
            id: id.into(),
            name: name.into(),
            arguments,
            result: None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChatMessage::User { id, .. } => id,
            ChatMessage::Agent { id, .. } => id,
            ChatMessage::Tool { id, .. } => id,
        }
    }

    /// Record the outcome of a tool invocation. No-op for other variants.
    pub fn resolve_tool<S: Into<String>>(&mut self, value: S) {
        if let ChatMessage::Tool { result, .. } = self {
            *result = Some(value.into());
        }
    }

    pub fn tool_result(&self) -> Option<&str> {
        match self {
            ChatMessage::Tool { result, .. } => result.as_deref(),
            _ => None,
        }
    }
}

/// What the user submits for one turn: free text plus zero or more images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    pub text: String,
    #[serde(default)]
    pub images: Vec<ImageContent>,
}

impl UserPayload {
    pub fn text<S: Into<String>>(text: S) -> Self {
        UserPayload {
            text: text.into(),
            images: Vec::new(),
        }
    }

    /// A payload with blank text and no images is not worth a turn.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_message_resolution() {
        let mut message = ChatMessage::tool_pending("call-1", "listFiles", json!({}));
        assert_eq!(message.tool_result(), None);

        message.resolve_tool("Files available:\n- a.txt");
        assert_eq!(message.tool_result(), Some("Files available:\n- a.txt"));
    }

    #[test]
    fn test_resolve_is_noop_for_other_authors() {
        let mut message = ChatMessage::agent("hello");
        message.resolve_tool("ignored");
        assert_eq!(message.tool_result(), None);
    }

    #[test]
    fn test_empty_payload() {
        assert!(UserPayload::text("   ").is_empty());
        assert!(!UserPayload::text("hi").is_empty());

        let with_image = UserPayload {
            text: String::new(),
            images: vec![ImageContent::new("aGVsbG8=", "image/png")],
        };
        assert!(!with_image.is_empty());
    }

    #[test]
    fn test_serializes_with_author_tag() {
        let message = ChatMessage::agent("done");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["author"], "agent");
        assert_eq!(value["text"], "done");
    }
}
