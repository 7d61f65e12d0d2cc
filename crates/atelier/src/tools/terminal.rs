//! A simulated terminal over the file workspace. Supports the small command
//! set the agent is told about: `ls`, `cat <file>`, `echo <text>`, `pwd`.

use crate::errors::{ToolError, ToolResult};

use super::files::FileSystem;

const WORKING_DIR: &str = "/workspace";

pub async fn execute(files: &dyn FileSystem, command: &str) -> ToolResult<String> {
    let trimmed = command.trim();
    let (program, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((program, rest)) => (program, rest.trim()),
        None => (trimmed, ""),
    };

    match program {
        "ls" => {
            let names = files.list().await?;
            if names.is_empty() {
                Ok(String::new())
            } else {
                Ok(names.join("\n"))
            }
        }
        "cat" => {
            if rest.is_empty() {
                return Err(ToolError::InvalidParameters(
                    "cat requires a file name".to_string(),
                ));
            }
            files.read(rest).await
        }
        "echo" => Ok(rest.trim_matches('"').to_string()),
        "pwd" => Ok(WORKING_DIR.to_string()),
        "" => Err(ToolError::InvalidParameters("empty command".to_string())),
        other => Err(ToolError::InvalidParameters(format!(
            "command not supported: {}. Supported commands: ls, cat, echo, pwd",
            other
        ))),
    }
}
