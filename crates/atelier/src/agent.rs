//! The orchestration loop: drives one user turn to a final answer.
//!
//! A turn submits the user's payload to the conversation session, then
//! repeats: if the model's reply requests tool calls, all calls in the batch
//! run concurrently, their stringified results go back to the model in
//! request order, and the next reply is inspected; a reply with no tool
//! requests ends the turn with one agent message. There is no iteration cap:
//! the loop runs as long as the model keeps requesting tools, and every
//! round is surfaced through the activity string.

use futures::future;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::errors::SessionError;
use crate::models::chat::{ChatMessage, UserPayload};
use crate::models::message::{Message, ToolRequest};
use crate::session::{ChatSession, ConfigAction, SessionConfig};
use crate::tools::{ToolRegistry, SEARCH_TOOL};

/// Shown when the model's final reply carries no text at all.
pub const FALLBACK_REPLY: &str = "Sorry, I could not process that request.";

/// Shown instead of entering the loop when no live session exists.
pub const SESSION_NOT_READY_REPLY: &str =
    "The conversation session is not initialized. Configure a supported provider and try again.";

/// Shown when a round is aborted by a transport or shaping failure.
pub const GENERIC_ERROR_REPLY: &str =
    "An unexpected error occurred. Please check the server logs for details.";

/// What the presentation layer renders next to the message list.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct AgentStatus {
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

pub struct Agent {
    session: ChatSession,
    registry: ToolRegistry,
    history: Vec<ChatMessage>,
    history_tx: watch::Sender<Vec<ChatMessage>>,
    status_tx: watch::Sender<AgentStatus>,
    status_rx: watch::Receiver<AgentStatus>,
}

impl Agent {
    /// An agent whose session still needs [`initialize`](Agent::initialize).
    /// The tools advertised to the model are the registry's declarations.
    pub fn new(config: SessionConfig, registry: ToolRegistry) -> Self {
        let session = ChatSession::new(config, registry.declarations());
        Agent::from_parts(session, registry)
    }

    /// An agent bound to an existing provider handle, used by tests.
    pub fn with_provider(
        config: SessionConfig,
        registry: ToolRegistry,
        provider: Box<dyn crate::providers::base::Provider>,
    ) -> Self {
        let session = ChatSession::with_provider(config, registry.declarations(), provider);
        Agent::from_parts(session, registry)
    }

    fn from_parts(session: ChatSession, registry: ToolRegistry) -> Self {
        let (status_tx, status_rx) = watch::channel(AgentStatus::default());
        let (history_tx, _) = watch::channel(Vec::new());
        Agent {
            session,
            registry,
            history: Vec::new(),
            history_tx,
            status_tx,
            status_rx,
        }
    }

    pub fn initialize(&mut self) -> Result<(), SessionError> {
        self.session.initialize()
    }

    /// Apply a configuration change. The chat history persists across the
    /// resulting session recreation.
    pub fn configure(&mut self, config: SessionConfig) -> Result<ConfigAction, SessionError> {
        self.session.configure(config)
    }

    pub fn session_config(&self) -> &SessionConfig {
        self.session.config()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn status(&self) -> AgentStatus {
        self.status_rx.borrow().clone()
    }

    /// A live view of the busy flag and activity text.
    pub fn subscribe(&self) -> watch::Receiver<AgentStatus> {
        self.status_rx.clone()
    }

    /// A live view of the chat history. Snapshots are published on every
    /// mutation, including the mid-turn pending and resolved tool entries,
    /// so readers see batch progress without waiting for the turn to end.
    pub fn watch_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.history_tx.subscribe()
    }

    fn record(&mut self, message: ChatMessage) {
        self.history.push(message);
        self.publish_history();
    }

    fn publish_history(&self) {
        let _ = self.history_tx.send(self.history.clone());
    }

    /// Drive one user turn to completion.
    ///
    /// All outcomes land in the history: a final agent reply on success, a
    /// single agent-authored error message when the session is missing or
    /// the round fails. The busy flag is held for the whole turn and cleared
    /// on every exit path.
    pub async fn send(&mut self, payload: UserPayload) {
        if payload.is_empty() {
            return;
        }

        if !self.session.is_ready() {
            warn!("send rejected: session not initialized");
            self.record(ChatMessage::agent(SESSION_NOT_READY_REPLY));
            return;
        }

        self.set_status(true, Some("Thinking..."));
        self.record(ChatMessage::user(&payload.text, payload.images.clone()));

        if let Err(e) = self.run_round(&payload).await {
            error!(error = %e, "conversation round failed");
            self.record(ChatMessage::agent(GENERIC_ERROR_REPLY));
        } else if let Some(instruction) = self.registry.take_instruction_update() {
            // Applied between turns so the tool-call pairing of the current
            // transcript is never broken mid-round.
            info!("applying self-updated system instruction");
            if let Err(e) = self.session.update_system_instruction(instruction) {
                warn!(error = %e, "could not rebind session with new instruction");
            }
        }

        self.set_status(false, None);
    }

    async fn run_round(&mut self, payload: &UserPayload) -> Result<(), SessionError> {
        let mut outbound = Message::user();
        if !payload.text.is_empty() {
            outbound = outbound.with_text(&payload.text);
        }
        for image in &payload.images {
            outbound = outbound.with_image(image.data.clone(), image.mime_type.clone());
        }

        let mut response = self.session.submit(outbound).await?;

        loop {
            let requests: Vec<ToolRequest> =
                response.tool_requests().into_iter().cloned().collect();

            if requests.is_empty() {
                let text = response.text();
                let text = if text.is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    text
                };
                self.record(ChatMessage::agent(text));
                return Ok(());
            }

            info!(count = requests.len(), "model requested tool calls");
            self.set_status(true, Some(&describe_batch(&requests)));

            // One pending entry per call, before anything executes, so the
            // whole batch shows as in-progress at once.
            for request in &requests {
                self.record(ChatMessage::tool_pending(
                    &request.id,
                    &request.call.name,
                    request.call.arguments.clone(),
                ));
            }

            // Fan out, then wait for the whole batch; join_all keeps the
            // output in request order regardless of completion order.
            let executions: Vec<_> = requests
                .iter()
                .map(|request| self.registry.dispatch(&request.call))
                .collect();
            let results: Vec<String> = future::join_all(executions).await;

            // Completion order is unspecified, so results are patched in by
            // id, never by position.
            for (request, result) in requests.iter().zip(results.iter()) {
                if let Some(entry) = self
                    .history
                    .iter_mut()
                    .find(|entry| entry.id() == request.id)
                {
                    entry.resolve_tool(result.clone());
                }
            }
            self.publish_history();

            let mut tool_reply = Message::user();
            for (request, result) in requests.iter().zip(results.into_iter()) {
                tool_reply =
                    tool_reply.with_tool_response(&request.id, &request.call.name, result);
            }

            self.set_status(true, Some("Processing tool results..."));
            response = self.session.submit(tool_reply).await?;
        }
    }

    fn set_status(&self, busy: bool, activity: Option<&str>) {
        let _ = self.status_tx.send(AgentStatus {
            busy,
            activity: activity.map(String::from),
        });
    }
}

fn describe_batch(requests: &[ToolRequest]) -> String {
    if requests.len() == 1 {
        let name = &requests[0].call.name;
        if name == SEARCH_TOOL {
            "Searching the web...".to_string()
        } else {
            format!("Using tool: {}...", name)
        }
    } else {
        let names: Vec<&str> = requests
            .iter()
            .map(|request| request.call.name.as_str())
            .collect();
        format!("Using tools: {}...", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ToolError, ToolResult};
    use crate::models::message::MessageContent;
    use crate::models::tool::ToolCall;
    use crate::providers::factory::ProviderType;
    use crate::providers::mock::MockProvider;
    use crate::tools::files::{FileSystem, VirtualFileSystem};
    use crate::tools::runner::ProcessRunner;
    use crate::tools::store::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config() -> SessionConfig {
        SessionConfig {
            api_key: Some("test-key".to_string()),
            ..SessionConfig::default()
        }
    }

    fn agent_with(provider: MockProvider) -> Agent {
        Agent::with_provider(
            test_config(),
            ToolRegistry::in_memory().unwrap(),
            Box::new(provider),
        )
    }

    fn agent_with_registry(provider: MockProvider, registry: ToolRegistry) -> Agent {
        Agent::with_provider(test_config(), registry, Box::new(provider))
    }

    /// A workspace whose reads stall, to force out-of-order batch completion.
    struct SlowReads {
        inner: VirtualFileSystem,
    }

    #[async_trait]
    impl FileSystem for SlowReads {
        async fn list(&self) -> ToolResult<Vec<String>> {
            self.inner.list().await
        }

        async fn read(&self, name: &str) -> ToolResult<String> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.read(name).await
        }

        async fn write(&self, name: &str, content: &str) -> ToolResult<()> {
            self.inner.write(name, content).await
        }
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_noop() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("unused")]);
        let calls = provider.call_counter();
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("   ")).await;

        assert!(agent.messages().is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(!agent.status().busy);
    }

    #[tokio::test]
    async fn test_simple_response_is_one_round_trip() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Hello!")]);
        let calls = provider.call_counter();
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("Hi")).await;

        let history = agent.messages();
        assert_eq!(history.len(), 2);
        assert!(matches!(&history[0], ChatMessage::User { text, .. } if text == "Hi"));
        assert!(matches!(&history[1], ChatMessage::Agent { text, .. } if text == "Hello!"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!agent.status().busy);
        assert_eq!(agent.status().activity, None);
    }

    #[tokio::test]
    async fn test_empty_final_text_uses_fallback() {
        let provider = MockProvider::new(vec![Message::assistant()]);
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("Hi")).await;

        assert!(
            matches!(agent.messages().last(), Some(ChatMessage::Agent { text, .. }) if text == FALLBACK_REPLY)
        );
    }

    #[tokio::test]
    async fn test_uninitialized_session_yields_one_error_message() {
        let mut config = test_config();
        config.provider = ProviderType::Custom;
        let mut agent = Agent::new(config, ToolRegistry::in_memory().unwrap());
        assert!(agent.initialize().is_err());

        agent.send(UserPayload::text("anything")).await;

        let history = agent.messages();
        assert_eq!(history.len(), 1);
        assert!(
            matches!(&history[0], ChatMessage::Agent { text, .. } if text == SESSION_NOT_READY_REPLY)
        );
        assert!(!agent.status().busy);
    }

    #[tokio::test]
    async fn test_list_files_scenario() {
        let files = Arc::new(VirtualFileSystem::new());
        files.write("a.txt", "alpha").await.unwrap();
        let registry = ToolRegistry::new(
            files,
            Arc::new(InMemoryStore::new()),
            Arc::new(ProcessRunner::default()),
        )
        .unwrap();

        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("call-1", ToolCall::new("listFiles", json!({}))),
            Message::assistant().with_text("Here are your files."),
        ]);
        let mut agent = agent_with_registry(provider, registry);

        agent.send(UserPayload::text("list files")).await;

        let history = agent.messages();
        assert_eq!(history.len(), 3);
        assert!(matches!(&history[0], ChatMessage::User { .. }));
        assert_eq!(
            history[1].tool_result(),
            Some("Files available:\n- a.txt")
        );
        assert!(
            matches!(&history[2], ChatMessage::Agent { text, .. } if text == "Here are your files.")
        );
    }

    #[tokio::test]
    async fn test_batch_appends_all_pending_then_resolves_all() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "1",
                    ToolCall::new("writeFile", json!({"fileName": "a.txt", "content": "x"})),
                )
                .with_tool_request(
                    "2",
                    ToolCall::new("writeFile", json!({"fileName": "b.txt", "content": "y"})),
                ),
            Message::assistant().with_text("All done!"),
        ]);
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("make two files")).await;

        let history = agent.messages();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].tool_result(), Some("Successfully wrote to a.txt."));
        assert_eq!(history[2].tool_result(), Some("Successfully wrote to b.txt."));
        assert!(matches!(&history[3], ChatMessage::Agent { text, .. } if text == "All done!"));
    }

    /// A workspace whose reads wait for an explicit go-ahead, so a test can
    /// inspect history while a batch is still executing.
    struct GatedReads {
        inner: VirtualFileSystem,
        gate: Arc<tokio::sync::Semaphore>,
    }

    #[async_trait]
    impl FileSystem for GatedReads {
        async fn list(&self) -> ToolResult<Vec<String>> {
            self.inner.list().await
        }

        async fn read(&self, name: &str) -> ToolResult<String> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            self.inner.read(name).await
        }

        async fn write(&self, name: &str, content: &str) -> ToolResult<()> {
            self.inner.write(name, content).await
        }
    }

    #[tokio::test]
    async fn test_whole_batch_is_pending_before_any_resolution() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let files = GatedReads {
            inner: VirtualFileSystem::new(),
            gate: Arc::clone(&gate),
        };
        files.inner.write("a.txt", "alpha").await.unwrap();
        files.inner.write("b.txt", "beta").await.unwrap();
        let registry = ToolRegistry::new(
            Arc::new(files),
            Arc::new(InMemoryStore::new()),
            Arc::new(ProcessRunner::default()),
        )
        .unwrap();

        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", ToolCall::new("readFile", json!({"fileName": "a.txt"})))
                .with_tool_request("2", ToolCall::new("readFile", json!({"fileName": "b.txt"}))),
            Message::assistant().with_text("done"),
        ]);
        let mut agent = agent_with_registry(provider, registry);
        let mut messages = agent.watch_messages();

        let turn = tokio::spawn(async move {
            agent.send(UserPayload::text("read both")).await;
            agent
        });

        // Both executors are parked on the gate, so this snapshot is taken
        // before any call resolves.
        let snapshot = tokio::time::timeout(
            Duration::from_secs(1),
            messages.wait_for(|history| history.len() == 3),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert!(matches!(&snapshot[0], ChatMessage::User { .. }));
        assert_eq!(snapshot[1].tool_result(), None);
        assert_eq!(snapshot[2].tool_result(), None);

        gate.add_permits(2);
        let agent = turn.await.unwrap();

        let history = agent.messages();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].tool_result(), Some("alpha"));
        assert_eq!(history[2].tool_result(), Some("beta"));
    }

    #[tokio::test]
    async fn test_tool_responses_preserve_request_order() {
        // First request is slow, second is fast; the response block must
        // still come back in request order.
        let files = SlowReads {
            inner: VirtualFileSystem::new(),
        };
        files.inner.write("slow.txt", "slow contents").await.unwrap();
        let registry = ToolRegistry::new(
            Arc::new(files),
            Arc::new(InMemoryStore::new()),
            Arc::new(ProcessRunner::default()),
        )
        .unwrap();

        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "slow",
                    ToolCall::new("readFile", json!({"fileName": "slow.txt"})),
                )
                .with_tool_request("fast", ToolCall::new("listFiles", json!({}))),
            Message::assistant().with_text("done"),
        ]);
        let transcripts = provider.transcripts();
        let mut agent = agent_with_registry(provider, registry);

        agent.send(UserPayload::text("go")).await;

        let transcripts = transcripts.lock().unwrap();
        assert_eq!(transcripts.len(), 2);
        let tool_turn = transcripts[1].last().unwrap();
        let responses: Vec<_> = tool_turn
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolResponse(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, "slow");
        assert_eq!(responses[0].result, "slow contents");
        assert_eq!(responses[1].id, "fast");
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_the_round() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request(
                    "1",
                    ToolCall::new("readFile", json!({"fileName": "missing.txt"})),
                )
                .with_tool_request("2", ToolCall::new("listFiles", json!({}))),
            Message::assistant().with_text("Recovered."),
        ]);
        let calls = provider.call_counter();
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("read and list")).await;

        let history = agent.messages();
        assert_eq!(history.len(), 4);
        assert!(history[1].tool_result().unwrap().starts_with("Error:"));
        assert_eq!(history[2].tool_result(), Some("The workspace is empty."));
        assert!(matches!(&history[3], ChatMessage::Agent { text, .. } if text == "Recovered."));
        // Both round trips happened; the failure was evidence, not an abort.
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_not_fatal() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", ToolCall::new("teleport", json!({}))),
            Message::assistant().with_text("Could not teleport."),
        ]);
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("teleport me")).await;

        let history = agent.messages();
        assert_eq!(history[1].tool_result(), Some("Unknown tool: teleport"));
        assert!(
            matches!(&history[2], ChatMessage::Agent { text, .. } if text == "Could not teleport.")
        );
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_with_one_error_message() {
        let mut agent = agent_with(MockProvider::failing());

        agent.send(UserPayload::text("Hi")).await;

        let history = agent.messages();
        assert_eq!(history.len(), 2);
        assert!(matches!(&history[0], ChatMessage::User { .. }));
        assert!(
            matches!(&history[1], ChatMessage::Agent { text, .. } if text == GENERIC_ERROR_REPLY)
        );
        assert!(!agent.status().busy);
    }

    #[tokio::test]
    async fn test_instruction_update_applies_after_the_turn() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "1",
                ToolCall::new(
                    "updateSystemInstruction",
                    json!({"newInstruction": "Be terse."}),
                ),
            ),
            Message::assistant().with_text("Understood."),
        ]);
        let mut agent = agent_with(provider);

        agent.send(UserPayload::text("change your behavior")).await;

        assert_eq!(agent.session_config().system_instruction, "Be terse.");
        assert!(
            matches!(agent.messages().last(), Some(ChatMessage::Agent { text, .. }) if text == "Understood.")
        );
    }

    #[tokio::test]
    async fn test_history_survives_reconfiguration() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Hello!")]);
        let mut agent = agent_with(provider);
        agent.send(UserPayload::text("Hi")).await;
        assert_eq!(agent.messages().len(), 2);

        let mut config = agent.session_config().clone();
        config.model = "gemini-2.0-flash".to_string();
        agent.configure(config).unwrap();

        assert_eq!(agent.messages().len(), 2);
    }

    #[test]
    fn test_describe_batch() {
        let single = vec![ToolRequest {
            id: "1".to_string(),
            call: ToolCall::new("readFile", json!({})),
        }];
        assert_eq!(describe_batch(&single), "Using tool: readFile...");

        let search = vec![ToolRequest {
            id: "1".to_string(),
            call: ToolCall::new(SEARCH_TOOL, json!({})),
        }];
        assert_eq!(describe_batch(&search), "Searching the web...");

        let many = vec![
            ToolRequest {
                id: "1".to_string(),
                call: ToolCall::new("readFile", json!({})),
            },
            ToolRequest {
                id: "2".to_string(),
                call: ToolCall::new("listFiles", json!({})),
            },
        ];
        assert_eq!(describe_batch(&many), "Using tools: readFile, listFiles...");
    }
}
