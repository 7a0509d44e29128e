//! Core of the Storyteller chat relay.
//!
//! Stories are summarized by a completion provider, appended to a summary
//! log, and pushed into the memory of a single long-lived agent hosted on a
//! remote agent server. Chat messages are relayed to that agent.

pub mod agent;
pub mod error;
pub mod identity;
pub mod relay;
pub mod summarizer;
pub mod summary;
pub mod types;
mod upstream;

pub use agent::{AgentProfile, AgentService, MemGptClient};
pub use error::{RelayError, Result, Upstream};
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use relay::{AgentUpdate, Relay, StoryReceipt, StoryStep};
pub use summarizer::{OpenAiSummarizer, Summarizer, DEFAULT_COMPLETION_URL, DEFAULT_SUMMARY_MODEL};
pub use summary::{
    FirebaseSummaryStore, MemorySummaryStore, RedbSummaryStore, ServiceAccountKey,
    ServiceAccountTokens, SummaryStore,
};
pub use types::{AgentId, ChatMessage, ChatRole, StorySummary};
pub use upstream::DEFAULT_TIMEOUT;
