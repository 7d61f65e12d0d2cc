//! The tool registry: a fixed mapping from tool names to executors.
//!
//! The registry's one contract with the orchestration loop is
//! [`ToolRegistry::dispatch`]: it always produces a string and never fails.
//! Executors return `ToolResult<String>` internally so tests can tell
//! success from failure without parsing text; the registry collapses the
//! error arm into an `"Error: ..."` string at the boundary, which is how
//! failures reach the model as evidence it can re-plan from.

pub mod files;
pub mod runner;
pub mod store;
pub mod terminal;
pub mod web;

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::{Tool, ToolCall};

use files::{FileSystem, VirtualFileSystem};
use runner::{ProcessRunner, ScriptRunner};
use store::{InMemoryStore, KeyValueStore};
use web::WebExplorer;

pub const SEARCH_TOOL: &str = "googleSearch";
const SEARCH_ACK: &str = "OK, search results are available to the model.";

pub struct ToolRegistry {
    files: Arc<dyn FileSystem>,
    store: Arc<dyn KeyValueStore>,
    runner: Arc<dyn ScriptRunner>,
    web: WebExplorer,
    scratchpad: Mutex<String>,
    pending_instruction: Mutex<Option<String>>,
}

impl ToolRegistry {
    pub fn new(
        files: Arc<dyn FileSystem>,
        store: Arc<dyn KeyValueStore>,
        runner: Arc<dyn ScriptRunner>,
    ) -> anyhow::Result<Self> {
        Ok(ToolRegistry {
            files,
            store,
            runner,
            web: WebExplorer::new()?,
            scratchpad: Mutex::new(String::new()),
            pending_instruction: Mutex::new(None),
        })
    }

    /// A registry over purely in-memory collaborators plus the default
    /// interpreter, for environments without an attached workspace.
    pub fn in_memory() -> anyhow::Result<Self> {
        ToolRegistry::new(
            Arc::new(VirtualFileSystem::new()),
            Arc::new(InMemoryStore::new()),
            Arc::new(ProcessRunner::default()),
        )
    }

    /// The declarations advertised to the model.
    pub fn declarations(&self) -> Vec<Tool> {
        declarations()
    }

    /// Resolve and run one tool call. Never fails: failures come back as
    /// `"Error: ..."` strings and an unrecognized name yields a literal
    /// `"Unknown tool: ..."` result.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let outcome = self.execute(call).await;
        match outcome {
            Ok(result) => {
                debug!(tool = %call.name, "tool call succeeded");
                result
            }
            Err(e) => {
                debug!(tool = %call.name, error = %e, "tool call failed");
                format!("Error: {}", e)
            }
        }
    }

    /// An instruction replacement requested by the agent itself via the
    /// `updateSystemInstruction` tool, if any. Taking it clears the signal.
    pub fn take_instruction_update(&self) -> Option<String> {
        self.pending_instruction.lock().unwrap().take()
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult<String> {
        let args = &call.arguments;
        match call.name.as_str() {
            "listFiles" => {
                let names = self.files.list().await?;
                if names.is_empty() {
                    Ok("The workspace is empty.".to_string())
                } else {
                    Ok(format!("Files available:\n- {}", names.join("\n- ")))
                }
            }
            "readFile" => {
                let name = required_str(args, "fileName")?;
                self.files.read(name).await
            }
            "writeFile" => {
                let name = required_str(args, "fileName")?;
                let content = required_str(args, "content")?;
                self.files.write(name, content).await?;
                Ok(format!("Successfully wrote to {}.", name))
            }
            "runJavascript" => {
                let code = required_str(args, "code")?;
                self.runner.run(code).await
            }
            "readUrl" => {
                let url = required_str(args, "url")?;
                self.web.read_url(url).await
            }
            SEARCH_TOOL => Ok(SEARCH_ACK.to_string()),
            "runTerminalCommand" => {
                let command = required_str(args, "command")?;
                terminal::execute(self.files.as_ref(), command).await
            }
            "updateSystemInstruction" => {
                let instruction = required_str(args, "newInstruction")?;
                *self.pending_instruction.lock().unwrap() = Some(instruction.to_string());
                Ok("System instruction updated. It will take effect on the next turn.".to_string())
            }
            "readScratchpad" => {
                let scratchpad = self.scratchpad.lock().unwrap();
                if scratchpad.is_empty() {
                    Ok("The scratchpad is empty.".to_string())
                } else {
                    Ok(scratchpad.clone())
                }
            }
            "updateScratchpad" => {
                let content = required_str(args, "content")?;
                *self.scratchpad.lock().unwrap() = content.to_string();
                Ok("Scratchpad updated.".to_string())
            }
            "writeData" => {
                let key = required_str(args, "key")?;
                let value = args
                    .get("value")
                    .cloned()
                    .ok_or_else(|| missing_parameter("value"))?;
                self.store.put(key, value).await?;
                Ok(format!("Successfully stored data with key '{}'.", key))
            }
            "readData" => {
                let key = required_str(args, "key")?;
                match self.store.get(key).await? {
                    Some(value) => serde_json::to_string_pretty(&value)
                        .map_err(|e| ToolError::ExecutionFailed(e.to_string())),
                    None => Ok(format!("No data found for key '{}'.", key)),
                }
            }
            "deleteData" => {
                let key = required_str(args, "key")?;
                if self.store.remove(key).await? {
                    Ok(format!("Successfully deleted data with key '{}'.", key))
                } else {
                    Ok(format!("No data found for key '{}'.", key))
                }
            }
            "getAllKeys" => {
                let keys = self.store.keys().await?;
                if keys.is_empty() {
                    Ok("The data store is currently empty.".to_string())
                } else {
                    Ok(format!("Available keys: {}", keys.join(", ")))
                }
            }
            other => Ok(format!("Unknown tool: {}", other)),
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> ToolResult<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing_parameter(key))
}

fn missing_parameter(key: &str) -> ToolError {
    ToolError::InvalidParameters(format!("missing required string parameter '{}'", key))
}

fn string_param(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn declarations() -> Vec<Tool> {
    vec![
        Tool::new(
            "listFiles",
            "Lists all files in the workspace.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        Tool::new(
            "readFile",
            "Reads the content of a specific file from the workspace.",
            json!({
                "type": "object",
                "properties": {"fileName": string_param("The name of the file to read.")},
                "required": ["fileName"]
            }),
        ),
        Tool::new(
            "writeFile",
            "Writes content to a file in the workspace. Creates the file if it doesn't exist, otherwise overwrites it.",
            json!({
                "type": "object",
                "properties": {
                    "fileName": string_param("The name of the file to write to."),
                    "content": string_param("The content to write to the file.")
                },
                "required": ["fileName", "content"]
            }),
        ),
        Tool::new(
            "runJavascript",
            "Executes a string of JavaScript code in a sandboxed environment and returns the output or error.",
            json!({
                "type": "object",
                "properties": {"code": string_param("The JavaScript code to execute.")},
                "required": ["code"]
            }),
        ),
        Tool::new(
            "readUrl",
            "Fetches and returns the text content of a given URL. Useful for reading articles or web pages found via web search.",
            json!({
                "type": "object",
                "properties": {"url": string_param("The URL of the page to read.")},
                "required": ["url"]
            }),
        ),
        Tool::new(
            SEARCH_TOOL,
            "Searches the web for real-time information, news, facts, or URLs.",
            json!({
                "type": "object",
                "properties": {"query": string_param("The search query.")},
                "required": ["query"]
            }),
        ),
        Tool::new(
            "runTerminalCommand",
            "Executes a shell command in a simulated terminal environment. Supports 'ls', 'cat <fileName>', 'echo <text>', and 'pwd'.",
            json!({
                "type": "object",
                "properties": {"command": string_param("The shell command to execute, e.g. 'ls' or 'cat myFile.txt'.")},
                "required": ["command"]
            }),
        ),
        Tool::new(
            "updateSystemInstruction",
            "Updates your core system instructions. Use this ONLY when the user explicitly asks you to change your behavior, logic, or personality.",
            json!({
                "type": "object",
                "properties": {"newInstruction": string_param("The new, complete system instruction string that will define your behavior going forward.")},
                "required": ["newInstruction"]
            }),
        ),
        Tool::new(
            "readScratchpad",
            "Reads the current content of your scratchpad, a scratch area for intermediate notes.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        Tool::new(
            "updateScratchpad",
            "Replaces the content of your scratchpad.",
            json!({
                "type": "object",
                "properties": {"content": string_param("The new scratchpad content.")},
                "required": ["content"]
            }),
        ),
        Tool::new(
            "writeData",
            "Stores a value under a key in the persistent data store.",
            json!({
                "type": "object",
                "properties": {
                    "key": string_param("The key to store the value under."),
                    "value": {"description": "The value to store. May be any JSON value."}
                },
                "required": ["key", "value"]
            }),
        ),
        Tool::new(
            "readData",
            "Reads the value stored under a key in the persistent data store.",
            json!({
                "type": "object",
                "properties": {"key": string_param("The key to read.")},
                "required": ["key"]
            }),
        ),
        Tool::new(
            "deleteData",
            "Deletes the value stored under a key in the persistent data store.",
            json!({
                "type": "object",
                "properties": {"key": string_param("The key to delete.")},
                "required": ["key"]
            }),
        ),
        Tool::new(
            "getAllKeys",
            "Lists all keys currently present in the persistent data store.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
    ]
}
