//! Single-slot persistence for the active agent identifier.
//!
//! At most one agent is active per deployment. A missing slot is the
//! normal first-run state and is reported as `Ok(None)`, never as an error.

use crate::error::Result;
use crate::types::AgentId;
use async_trait::async_trait;
use log::{debug, info};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load the cached agent id, `None` if no agent has been created yet.
    async fn load(&self) -> Result<Option<AgentId>>;

    /// Replace the cached agent id.
    async fn save(&self, id: &AgentId) -> Result<()>;

    /// Forget the cached agent id so the next request provisions a new agent.
    async fn clear(&self) -> Result<()>;
}

/// Plain-text file holding the agent id.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn load(&self) -> Result<Option<AgentId>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let id = AgentId::parse(&contents);
                if let Some(ref id) = id {
                    debug!("Using existing agent ID: {}", id);
                }
                Ok(id)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No agent ID file at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, id: &AgentId) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, id.as_str()).await?;
        info!("Agent ID {} saved to {}", id, self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process identity slot. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    slot: RwLock<Option<AgentId>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(id: AgentId) -> Self {
        Self {
            slot: RwLock::new(Some(id)),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self) -> Result<Option<AgentId>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, id: &AgentId) -> Result<()> {
        *self.slot.write().await = Some(id.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileIdentityStore::new(dir.path().join("agent_id.txt"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_contents_are_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_id.txt");
        std::fs::write(&path, "  agent-42 \n").unwrap();

        let store = FileIdentityStore::new(&path);
        let id = store.load().await.unwrap().unwrap();
        assert_eq!(id.as_str(), "agent-42");
    }

    #[tokio::test]
    async fn whitespace_only_file_means_no_agent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent_id.txt");
        std::fs::write(&path, "\n  \n").unwrap();

        let store = FileIdentityStore::new(&path);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("agent_id.txt");
        let id = AgentId::parse("agent-7").unwrap();

        FileIdentityStore::new(&path).save(&id).await.unwrap();

        let reopened = FileIdentityStore::new(&path);
        assert_eq!(reopened.load().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn clear_removes_the_slot() {
        let dir = TempDir::new().unwrap();
        let store = FileIdentityStore::new(dir.path().join("agent_id.txt"));
        store.save(&AgentId::parse("a").unwrap()).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        // Clearing an empty slot is fine too
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be
        let store = FileIdentityStore::new(dir.path());
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryIdentityStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let id = AgentId::parse("mem-1").unwrap();
        store.save(&id).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(id));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
