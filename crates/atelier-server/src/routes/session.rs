use crate::state::AppState;
use atelier::providers::factory::ProviderType;
use atelier::session::ConfigAction;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SessionConfigResponse {
    provider: ProviderType,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    /// Masked; the real key never leaves the process.
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    system_instruction: String,
    ready: bool,
}

#[derive(Debug, Deserialize, Serialize)]
struct UpdateSessionRequest {
    provider: ProviderType,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    system_instruction: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateSessionResponse {
    action: String,
    ready: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

async fn get_config(State(state): State<AppState>) -> Json<SessionConfigResponse> {
    let agent = state.agent.lock().await;
    let config = agent.session_config();
    Json(SessionConfigResponse {
        provider: config.provider,
        model: config.model.clone(),
        host: config.base_url.clone(),
        api_key: config.api_key.as_ref().map(|_| "********".to_string()),
        system_instruction: config.system_instruction.clone(),
        ready: agent.is_ready(),
    })
}

/// Apply a configuration change. Fields left out of the request keep their
/// current values; any effective change rebuilds the model session while the
/// chat history stays put.
async fn update_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateSessionRequest>,
) -> impl IntoResponse {
    let mut agent = state.agent.lock().await;

    let mut config = agent.session_config().clone();
    config.provider = request.provider;
    if let Some(model) = request.model {
        config.model = model;
    }
    if let Some(api_key) = request.api_key {
        config.api_key = Some(api_key);
    }
    if let Some(host) = request.host {
        config.base_url = Some(host);
    }
    if let Some(instruction) = request.system_instruction {
        config.system_instruction = instruction;
    }

    match agent.configure(config) {
        Ok(action) => {
            let action = match action {
                ConfigAction::Keep => "keep",
                ConfigAction::Recreate => "recreate",
            };
            (
                StatusCode::OK,
                Json(UpdateSessionResponse {
                    action: action.to_string(),
                    ready: agent.is_ready(),
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Could not apply session configuration: {}", e),
            }),
        )
            .into_response(),
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/session/config", get(get_config).put(update_config))
        .with_state(state)
}
