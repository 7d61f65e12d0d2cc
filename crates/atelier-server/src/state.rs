use atelier::agent::{Agent, AgentStatus};
use atelier::models::chat::ChatMessage;
use atelier::tools::files::FileSystem;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Shared application state: one agent, serialized behind a lock so turns
/// never interleave. Tool calls within a turn still run concurrently; the
/// lock only orders whole turns. The status and message receivers are split
/// out so reads stay responsive while a turn holds the lock, which is also
/// how pending tool entries become visible mid-turn. The file workspace is
/// shared with the agent's registry so explorer routes see the same files
/// the tools do.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Mutex<Agent>>,
    pub status: watch::Receiver<AgentStatus>,
    pub messages: watch::Receiver<Vec<ChatMessage>>,
    pub files: Arc<dyn FileSystem>,
}

impl AppState {
    pub fn new(agent: Agent, files: Arc<dyn FileSystem>) -> Self {
        let status = agent.subscribe();
        let messages = agent.watch_messages();
        AppState {
            agent: Arc::new(Mutex::new(agent)),
            status,
            messages,
            files,
        }
    }
}
