//! Conversation session lifecycle.
//!
//! A session is the live binding between the client and one remote model
//! configuration. It is a two-state machine: `Uninitialized` until a
//! supported provider has been constructed, `Ready` afterwards. There is no
//! in-place reconfiguration: any effective configuration change discards the
//! remote handle (and its wire transcript) and builds a fresh one. The chat
//! history rendered to the user lives in the [`Agent`](crate::agent::Agent)
//! and survives session recreation.

use tracing::debug;

use crate::errors::SessionError;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::prompt::DEFAULT_SYSTEM_INSTRUCTION;
use crate::providers::base::Provider;
use crate::providers::factory::{self, ProviderType};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub provider: ProviderType,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub system_instruction: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            provider: ProviderType::Gemini,
            model: "gemini-2.5-pro".to_string(),
            api_key: None,
            base_url: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// What a configuration change requires of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Keep,
    Recreate,
}

/// Pure transition function from (old config, new config) to the required
/// action. Any effective change rebinds the remote handle; there is no
/// partial update path.
pub fn reconcile(old: &SessionConfig, new: &SessionConfig) -> ConfigAction {
    if old == new {
        ConfigAction::Keep
    } else {
        ConfigAction::Recreate
    }
}

/// The live remote handle: a provider plus the wire transcript it has seen.
pub struct ModelSession {
    provider: Box<dyn Provider>,
    system: String,
    tools: Vec<Tool>,
    transcript: Vec<Message>,
}

impl ModelSession {
    pub fn new(provider: Box<dyn Provider>, system: String, tools: Vec<Tool>) -> Self {
        ModelSession {
            provider,
            system,
            tools,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Send one turn and wait for the model's reply. On transport failure the
    /// submitted turn is rolled back so the transcript stays paired.
    pub async fn submit(&mut self, message: Message) -> Result<Message, SessionError> {
        self.transcript.push(message);
        let completion = self
            .provider
            .complete(&self.system, &self.transcript, &self.tools)
            .await;

        match completion {
            Ok((reply, usage)) => {
                debug!(
                    input_tokens = ?usage.input_tokens,
                    output_tokens = ?usage.output_tokens,
                    "model turn complete"
                );
                self.transcript.push(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                self.transcript.pop();
                Err(SessionError::Provider(e))
            }
        }
    }
}

enum SessionState {
    Uninitialized,
    Ready(ModelSession),
}

pub struct ChatSession {
    config: SessionConfig,
    tools: Vec<Tool>,
    state: SessionState,
}

impl ChatSession {
    /// A session that has not been mounted yet. Call [`initialize`] (or
    /// [`configure`]) to drive it to the ready state.
    ///
    /// [`initialize`]: ChatSession::initialize
    /// [`configure`]: ChatSession::configure
    pub fn new(config: SessionConfig, tools: Vec<Tool>) -> Self {
        ChatSession {
            config,
            tools,
            state: SessionState::Uninitialized,
        }
    }

    /// A session pre-bound to the given provider handle, used by tests and
    /// callers that construct providers themselves.
    pub fn with_provider(
        config: SessionConfig,
        tools: Vec<Tool>,
        provider: Box<dyn Provider>,
    ) -> Self {
        let session = ModelSession::new(
            provider,
            config.system_instruction.clone(),
            tools.clone(),
        );
        ChatSession {
            config,
            tools,
            state: SessionState::Ready(session),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// First-mount transition. Leaves the session uninitialized on failure.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.recreate()
    }

    /// Apply a configuration change through the transition function. A
    /// `Keep` leaves the live handle untouched; a `Recreate` discards it and
    /// binds a new one to the new configuration.
    pub fn configure(&mut self, new_config: SessionConfig) -> Result<ConfigAction, SessionError> {
        match reconcile(&self.config, &new_config) {
            ConfigAction::Keep => {
                // Re-mount if a previous recreation failed and left us down.
                if !self.is_ready() {
                    self.recreate()?;
                    return Ok(ConfigAction::Recreate);
                }
                Ok(ConfigAction::Keep)
            }
            ConfigAction::Recreate => {
                self.config = new_config;
                self.recreate()?;
                Ok(ConfigAction::Recreate)
            }
        }
    }

    /// Replace the system instruction and rebind the session so the next
    /// send uses it.
    pub fn update_system_instruction(&mut self, text: String) -> Result<(), SessionError> {
        self.config.system_instruction = text;
        self.recreate()
    }

    fn recreate(&mut self) -> Result<(), SessionError> {
        match factory::get_provider(&self.config) {
            Ok(provider) => {
                self.state = SessionState::Ready(ModelSession::new(
                    provider,
                    self.config.system_instruction.clone(),
                    self.tools.clone(),
                ));
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Forward one turn to the remote session. Fails pre-flight with
    /// `SessionError::NotInitialized` when no live handle exists.
    pub async fn submit(&mut self, message: Message) -> Result<Message, SessionError> {
        match &mut self.state {
            SessionState::Uninitialized => Err(SessionError::NotInitialized),
            SessionState::Ready(session) => session.submit(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;

    fn config_with_key() -> SessionConfig {
        SessionConfig {
            api_key: Some("test-key".to_string()),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_reconcile_keeps_identical_config() {
        let config = config_with_key();
        assert_eq!(reconcile(&config, &config.clone()), ConfigAction::Keep);
    }

    #[test]
    fn test_reconcile_recreates_on_effective_changes() {
        let old = config_with_key();

        let mut new = old.clone();
        new.model = "gemini-2.0-flash".to_string();
        assert_eq!(reconcile(&old, &new), ConfigAction::Recreate);

        let mut new = old.clone();
        new.provider = ProviderType::OpenAi;
        assert_eq!(reconcile(&old, &new), ConfigAction::Recreate);

        let mut new = old.clone();
        new.system_instruction = "You are terse.".to_string();
        assert_eq!(reconcile(&old, &new), ConfigAction::Recreate);
    }

    #[test]
    fn test_first_mount_reaches_ready() {
        let mut session = ChatSession::new(config_with_key(), Vec::new());
        assert!(!session.is_ready());
        session.initialize().unwrap();
        assert!(session.is_ready());
    }

    #[test]
    fn test_unsupported_provider_stays_uninitialized() {
        let mut config = config_with_key();
        config.provider = ProviderType::Custom;
        let mut session = ChatSession::new(config, Vec::new());

        let err = session.initialize().unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedProvider(_)));
        assert!(!session.is_ready());
    }

    #[test]
    fn test_missing_api_key_fails_initialization() {
        let mut session = ChatSession::new(SessionConfig::default(), Vec::new());
        assert!(session.initialize().is_err());
        assert!(!session.is_ready());
    }

    #[test]
    fn test_configure_switches_away_from_live_session() {
        let mut session = ChatSession::new(config_with_key(), Vec::new());
        session.initialize().unwrap();

        let mut config = session.config().clone();
        config.provider = ProviderType::Custom;
        assert!(session.configure(config).is_err());
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_submit_rejected_when_uninitialized() {
        let mut session = ChatSession::new(config_with_key(), Vec::new());
        let err = session
            .submit(Message::user().with_text("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotInitialized));
    }

    #[tokio::test]
    async fn test_transcript_accumulates_turns() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("hi")]);
        let mut session =
            ModelSession::new(Box::new(provider), "system".to_string(), Vec::new());

        let reply = session
            .submit(Message::user().with_text("hello"))
            .await
            .unwrap();
        assert_eq!(reply.text(), "hi");
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_turn_rolls_back_transcript() {
        let mut session = ModelSession::new(
            Box::new(MockProvider::failing()),
            "system".to_string(),
            Vec::new(),
        );

        let result = session.submit(Message::user().with_text("hello")).await;
        assert!(result.is_err());
        assert!(session.transcript().is_empty());
    }
}
