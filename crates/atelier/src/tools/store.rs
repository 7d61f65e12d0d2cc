use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::{ToolError, ToolResult};

/// Persistent key-value storage for the agent. Each operation is
/// independently transactional; the registry does not coordinate them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, key: &str, value: Value) -> ToolResult<()>;
    async fn get(&self, key: &str) -> ToolResult<Option<Value>>;
    /// Returns whether the key existed.
    async fn remove(&self, key: &str) -> ToolResult<bool>;
    async fn keys(&self) -> ToolResult<Vec<String>>;
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn put(&self, key: &str, value: Value) -> ToolResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> ToolResult<Option<Value>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> ToolResult<bool> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn keys(&self) -> ToolResult<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }
}

/// Store persisted as a single JSON document. The whole document is read and
/// rewritten per operation, which keeps each operation transactional at the
/// file level.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        JsonFileStore { path: path.into() }
    }

    /// `~/.config/atelier/store.json`, creating the directory if needed.
    pub fn default_location() -> std::io::Result<Self> {
        let dir = dirs::home_dir()
            .map(|home| home.join(".config/atelier"))
            .unwrap_or_else(|| PathBuf::from(".config/atelier"));
        std::fs::create_dir_all(&dir)?;
        Ok(JsonFileStore::new(dir.join("store.json")))
    }

    async fn load(&self) -> ToolResult<BTreeMap<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ToolError::ExecutionFailed(format!("store is corrupt: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ToolError::ExecutionFailed(format!(
                "could not read store: {}",
                e
            ))),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, Value>) -> ToolResult<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("could not write store: {}", e)))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn put(&self, key: &str, value: Value) -> ToolResult<()> {
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.save(&entries).await
    }

    async fn get(&self, key: &str) -> ToolResult<Option<Value>> {
        Ok(self.load().await?.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> ToolResult<bool> {
        let mut entries = self.load().await?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries).await?;
        }
        Ok(existed)
    }

    async fn keys(&self) -> ToolResult<Vec<String>> {
        Ok(self.load().await?.keys().cloned().collect())
    }
}
