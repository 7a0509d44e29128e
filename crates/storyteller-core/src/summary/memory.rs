use super::SummaryStore;
use crate::error::Result;
use crate::types::StorySummary;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary log held in process memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    entries: RwLock<Vec<StorySummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored summaries in append order.
    pub async fn entries(&self) -> Vec<StorySummary> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn append(&self, text: &str) -> Result<String> {
        let summary = StorySummary {
            key: Uuid::now_v7().to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        let key = summary.key.clone();
        self.entries.write().await.push(summary);
        Ok(key)
    }

    async fn latest(&self) -> Result<Option<StorySummary>> {
        // max_by_key keeps the last of equal elements, so ties go to the newest append
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .max_by_key(|s| s.created_at)
            .cloned())
    }
}
