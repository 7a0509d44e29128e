use super::SummaryStore;
use crate::error::{RelayError, Result};
use crate::types::StorySummary;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::info;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

// Keyed by UUIDv7 bytes, so key order is timestamp order
const SUMMARIES: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("story_summaries");

#[derive(Serialize, Deserialize)]
struct StoredSummary {
    text: String,
    timestamp_ms: i64,
}

/// Summary log in a local redb file.
pub struct RedbSummaryStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbSummaryStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SUMMARIES)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SUMMARIES)?;
        Ok(table.len()?)
    }

    fn timestamp_of(id: &Uuid) -> Result<i64> {
        let ts = id
            .get_timestamp()
            .ok_or_else(|| RelayError::Corrupt(format!("key {} carries no timestamp", id)))?;
        let (secs, nanos) = ts.to_unix();
        Ok(secs as i64 * 1000 + (nanos / 1_000_000) as i64)
    }

    fn to_datetime(timestamp_ms: i64) -> Result<DateTime<Utc>> {
        Utc.timestamp_millis_opt(timestamp_ms)
            .single()
            .ok_or_else(|| RelayError::Corrupt(format!("invalid timestamp {}", timestamp_ms)))
    }
}

#[async_trait]
impl SummaryStore for RedbSummaryStore {
    async fn append(&self, text: &str) -> Result<String> {
        let id = Uuid::now_v7();
        let stored = StoredSummary {
            text: text.to_string(),
            timestamp_ms: Self::timestamp_of(&id)?,
        };
        let bytes = bincode::serialize(&stored)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SUMMARIES)?;
            table.insert(id.as_bytes(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        info!("Summary stored with ID: {}", id);
        Ok(id.to_string())
    }

    async fn latest(&self) -> Result<Option<StorySummary>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SUMMARIES)?;

        let Some((key, value)) = table.last()? else {
            return Ok(None);
        };

        let id = Uuid::from_bytes(*key.value());
        let stored: StoredSummary = bincode::deserialize(value.value())?;

        Ok(Some(StorySummary {
            key: id.to_string(),
            text: stored.text,
            created_at: Self::to_datetime(stored.timestamp_ms)?,
        }))
    }
}
