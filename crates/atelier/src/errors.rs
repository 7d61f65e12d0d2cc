use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced inside tool executors. These never cross the registry
/// boundary as errors: `ToolRegistry::dispatch` collapses them into
/// `"Error: ..."` strings that are relayed to the model as ordinary results.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("File not found or could not be read: {0}")]
    FileNotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Errors raised by the conversation session. `NotInitialized` is the
/// pre-flight configuration error; `Provider` wraps transport failures,
/// which are fatal to the current round.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session is not initialized; configure a supported provider first")]
    NotInitialized,

    #[error("provider '{0}' is not supported by the agent loop")]
    UnsupportedProvider(String),

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}
