use crate::error::{to_env_var, ConfigError};
use atelier::providers::configs::{GEMINI_DEFAULT_HOST, OPENAI_DEFAULT_HOST};
use atelier::providers::factory::ProviderType;
use atelier::prompt::DEFAULT_SYSTEM_INSTRUCTION;
use atelier::session::SessionConfig;
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Gemini {
        #[serde(default = "default_gemini_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default)]
        system_instruction: Option<String>,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        system_instruction: Option<String>,
    },
}

impl ProviderSettings {
    // Convert to the session configuration the agent consumes
    pub fn into_config(self) -> SessionConfig {
        match self {
            ProviderSettings::Gemini {
                host,
                api_key,
                model,
                system_instruction,
            } => SessionConfig {
                provider: ProviderType::Gemini,
                model,
                api_key: Some(api_key),
                base_url: Some(host),
                system_instruction: system_instruction
                    .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            },
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                system_instruction,
            } => SessionConfig {
                provider: ProviderType::OpenAi,
                model,
                api_key: Some(api_key),
                base_url: Some(host),
                system_instruction: system_instruction
                    .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    /// Directory to mount as the agent's workspace. Unset means a purely
    /// in-memory workspace that vanishes with the process.
    #[serde(default)]
    pub workspace: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("ATELIER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Report missing fields as the environment variable that supplies
        // them, which is how operators actually configure this binary.
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches("`");
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_gemini_host() -> String {
    GEMINI_DEFAULT_HOST.to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_openai_host() -> String {
    OPENAI_DEFAULT_HOST.to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
