use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    /// Base64 encoded payload, without the data-url prefix.
    pub data: String,
    pub mime_type: String,
}

impl ImageContent {
    pub fn new<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL, the format browser
    /// frontends produce for pasted or uploaded images. Falls back to
    /// `image/jpeg` when the header carries no MIME type.
    pub fn from_data_url(data_url: &str) -> Option<Self> {
        let (header, payload) = data_url.split_once(',')?;
        if !header.starts_with("data:") {
            return None;
        }
        let mime_type = header
            .trim_start_matches("data:")
            .split(';')
            .next()
            .filter(|m| !m.is_empty())
            .unwrap_or("image/jpeg");
        Some(ImageContent::new(payload, mime_type))
    }
}

/// Content passed to or from an LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent { text: text.into() })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        Content::Image(ImageContent::new(data, mime_type))
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}
