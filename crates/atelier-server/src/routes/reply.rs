use crate::state::AppState;
use atelier::models::chat::{ChatMessage, UserPayload};
use atelier::models::content::ImageContent;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// The wire shape of a user turn. Images arrive as data URLs, the format
/// browser frontends produce for pasted or uploaded attachments.
#[derive(Debug, Deserialize)]
struct ReplyRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReplyResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Drive one full turn and respond with the updated chat history. The agent
/// lock is held for the whole turn, so concurrent replies queue up.
async fn reply_handler(
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> impl IntoResponse {
    let mut images = Vec::with_capacity(request.images.len());
    for data_url in &request.images {
        match ImageContent::from_data_url(data_url) {
            Some(image) => images.push(image),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "images must be base64 data URLs".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }

    let payload = UserPayload {
        text: request.text,
        images,
    };

    let mut agent = state.agent.lock().await;
    agent.send(payload).await;
    Json(ReplyResponse {
        messages: agent.messages().to_vec(),
    })
    .into_response()
}

// Reads the published history snapshot rather than the agent, so the
// transcript stays renderable while a turn holds the lock. Mid-turn the
// snapshot already includes the pending tool entries.
async fn messages_handler(State(state): State<AppState>) -> Json<Vec<ChatMessage>> {
    Json(state.messages.borrow().clone())
}

// Reads the watch channel rather than the agent, so polling works while a
// turn holds the lock.
async fn status_handler(State(state): State<AppState>) -> Json<atelier::agent::AgentStatus> {
    Json(state.status.borrow().clone())
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(reply_handler))
        .route("/messages", get(messages_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}
