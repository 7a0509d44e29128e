//! Append-only, time-ordered log of story summaries.

mod firebase;
mod memory;
mod redb_store;
mod service_account;

pub use firebase::FirebaseSummaryStore;
pub use memory::MemorySummaryStore;
pub use redb_store::RedbSummaryStore;
pub use service_account::{ServiceAccountKey, ServiceAccountTokens, GOOGLE_TOKEN_URI};

use crate::error::Result;
use crate::types::StorySummary;
use async_trait::async_trait;

/// Default collection path used by the realtime database backend.
pub const DEFAULT_SUMMARY_PATH: &str = "story_summaries";

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Append a summary. The store assigns the key and the timestamp.
    async fn append(&self, text: &str) -> Result<String>;

    /// The entry with the greatest timestamp, or `None` if nothing is stored.
    ///
    /// Entries sharing a timestamp are ordered however the backend orders
    /// them; callers must not rely on a particular tie-break.
    async fn latest(&self) -> Result<Option<StorySummary>>;
}
