use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{ToolError, ToolResult};

/// Sandboxed code execution. The sandbox boundary is whatever the configured
/// interpreter provides; the agent only sees a string outcome.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, code: &str) -> ToolResult<String>;
}

/// Runs code by handing it to an interpreter subprocess, `node -e` by
/// default. Stdout is the result; a nonzero exit turns stderr into the
/// error.
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
}

impl ProcessRunner {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        ProcessRunner {
            program: program.into(),
            args,
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        ProcessRunner::new("node", vec!["-e".to_string()])
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    async fn run(&self, code: &str) -> ToolResult<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(code)
            .output()
            .await
            .map_err(|e| {
                ToolError::ExecutionFailed(format!(
                    "could not start interpreter '{}': {}",
                    self.program, e
                ))
            })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
            if stdout.is_empty() {
                Ok("(no output)".to_string())
            } else {
                Ok(stdout)
            }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            Err(ToolError::ExecutionFailed(if stderr.is_empty() {
                format!("interpreter exited with {}", output.status)
            } else {
                stderr
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The tests drive the runner with shell builtins so they do not depend
    // on a JavaScript interpreter being installed.

    #[tokio::test]
    async fn test_captures_stdout() {
        let runner = ProcessRunner::new("sh", vec!["-c".to_string()]);
        let output = runner.run("echo hello").await.unwrap();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn test_empty_output_is_reported() {
        let runner = ProcessRunner::new("sh", vec!["-c".to_string()]);
        let output = runner.run("true").await.unwrap();
        assert_eq!(output, "(no output)");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let runner = ProcessRunner::new("sh", vec!["-c".to_string()]);
        let err = runner.run("echo broken >&2; exit 3").await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(ref m) if m.contains("broken")));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let runner = ProcessRunner::new("definitely-not-a-real-binary", Vec::new());
        let err = runner.run("1 + 1").await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
