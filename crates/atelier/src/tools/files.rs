use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{ToolError, ToolResult};

/// The file workspace the agent operates on. Backed either by a real
/// directory or by an in-memory map; the registry is agnostic to which.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Sorted file names in the workspace.
    async fn list(&self) -> ToolResult<Vec<String>>;
    async fn read(&self, name: &str) -> ToolResult<String>;
    /// Create or overwrite a file.
    async fn write(&self, name: &str, content: &str) -> ToolResult<()>;
}

/// In-memory workspace used when no directory is attached.
#[derive(Default)]
pub struct VirtualFileSystem {
    files: Mutex<BTreeMap<String, String>>,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileSystem for VirtualFileSystem {
    async fn list(&self) -> ToolResult<Vec<String>> {
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    async fn read(&self, name: &str) -> ToolResult<String> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::FileNotFound(name.to_string()))
    }

    async fn write(&self, name: &str, content: &str) -> ToolResult<()> {
        validate_name(name)?;
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_string());
        Ok(())
    }
}

/// Workspace backed by one flat directory on disk.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        LocalFileSystem { root: root.into() }
    }

    fn resolve(&self, name: &str) -> ToolResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

// File names come from the model; keep them inside the workspace root.
fn validate_name(name: &str) -> ToolResult<()> {
    let valid = !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
        && Path::new(name).file_name().is_some();
    if valid {
        Ok(())
    } else {
        Err(ToolError::InvalidParameters(format!(
            "'{}' is not a valid file name",
            name
        )))
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn list(&self) -> ToolResult<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("could not list workspace: {}", e)))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> ToolResult<String> {
        let path = self.resolve(name)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| ToolError::FileNotFound(name.to_string()))
    }

    async fn write(&self, name: &str, content: &str) -> ToolResult<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("could not write {}: {}", name, e)))
    }
}
