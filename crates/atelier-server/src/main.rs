mod configuration;
mod error;
mod routes;
mod state;

use atelier::agent::Agent;
use atelier::tools::files::{FileSystem, LocalFileSystem, VirtualFileSystem};
use atelier::tools::runner::ProcessRunner;
use atelier::tools::store::{InMemoryStore, JsonFileStore, KeyValueStore};
use atelier::tools::ToolRegistry;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let settings = configuration::Settings::new()?;
    let addr = settings.server.socket_addr();

    let files: Arc<dyn FileSystem> = match &settings.workspace {
        Some(dir) => {
            info!("mounting workspace directory {}", dir);
            Arc::new(LocalFileSystem::new(dir))
        }
        None => {
            info!("no workspace configured, files are in-memory only");
            Arc::new(VirtualFileSystem::new())
        }
    };

    let store: Arc<dyn KeyValueStore> = match JsonFileStore::default_location() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("data store unavailable, keys are in-memory only: {}", e);
            Arc::new(InMemoryStore::new())
        }
    };

    let registry = ToolRegistry::new(files.clone(), store, Arc::new(ProcessRunner::default()))?;

    let mut agent = Agent::new(settings.provider.into_config(), registry);
    if let Err(e) = agent.initialize() {
        // Served anyway; the session can be repaired over PUT /session/config.
        warn!("session not initialized: {}", e);
    }
    let state = state::AppState::new(agent, files);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
