pub const GEMINI_DEFAULT_HOST: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_DEFAULT_HOST: &str = "https://api.openai.com";

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}
