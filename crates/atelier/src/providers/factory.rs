use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::base::Provider;
use super::configs::{
    GeminiProviderConfig, OpenAiProviderConfig, GEMINI_DEFAULT_HOST, OPENAI_DEFAULT_HOST,
};
use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use crate::errors::SessionError;
use crate::session::SessionConfig;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    OpenAi,
    /// A user-supplied backend the agent loop has no driver for. Selecting
    /// it parks the session in the uninitialized state.
    Custom,
}

pub fn get_provider(config: &SessionConfig) -> Result<Box<dyn Provider>, SessionError> {
    let api_key = || {
        config
            .api_key
            .clone()
            .ok_or_else(|| SessionError::Provider(anyhow!("no API key configured")))
    };

    match config.provider {
        ProviderType::Gemini => Ok(Box::new(
            GeminiProvider::new(GeminiProviderConfig {
                host: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| GEMINI_DEFAULT_HOST.to_string()),
                api_key: api_key()?,
                model: config.model.clone(),
            })
            .map_err(SessionError::Provider)?,
        )),
        ProviderType::OpenAi => Ok(Box::new(
            OpenAiProvider::new(OpenAiProviderConfig {
                host: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENAI_DEFAULT_HOST.to_string()),
                api_key: api_key()?,
                model: config.model.clone(),
            })
            .map_err(SessionError::Provider)?,
        )),
        ProviderType::Custom => Err(SessionError::UnsupportedProvider(
            ProviderType::Custom.to_string(),
        )),
    }
}
