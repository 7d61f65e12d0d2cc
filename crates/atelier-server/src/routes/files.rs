use crate::state::AppState;
use atelier::errors::ToolError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct FileListResponse {
    files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FileResponse {
    name: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WriteFileRequest {
    content: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: ToolError) -> axum::response::Response {
    let status = match e {
        ToolError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        ToolError::FileNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

async fn list_files(State(state): State<AppState>) -> impl IntoResponse {
    match state.files.list().await {
        Ok(files) => Json(FileListResponse { files }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn read_file(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    match state.files.read(&name).await {
        Ok(content) => Json(FileResponse { name, content }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn write_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<WriteFileRequest>,
) -> impl IntoResponse {
    match state.files.write(&name, &request.content).await {
        Ok(()) => Json(FileResponse {
            name,
            content: request.content,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

// Configure routes for this module. These operate on the same workspace the
// agent's file tools use, so edits made here show up in the next turn.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/files", get(list_files))
        .route("/files/:name", get(read_file).put(write_file))
        .with_state(state)
}
