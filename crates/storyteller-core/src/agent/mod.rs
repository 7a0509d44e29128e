//! Client side of the remote conversational-agent server.

mod memgpt;
mod reply;

pub use memgpt::{AgentProfile, MemGptClient};
pub use reply::{decode_reply, AgentMessage, FunctionCall, SEND_MESSAGE_FUNCTION};

use crate::error::Result;
use crate::types::AgentId;
use async_trait::async_trait;

#[async_trait]
pub trait AgentService: Send + Sync {
    /// Provision a new agent whose memory starts with `seed_summary`.
    async fn create_agent(&self, seed_summary: &str) -> Result<AgentId>;

    /// Tell an existing agent to add `summary` to what it already knows.
    ///
    /// Success only means the server accepted the message.
    async fn append_memory(&self, id: &AgentId, summary: &str) -> Result<()>;

    /// Send a user message and return the agent's reply text.
    async fn converse(&self, id: &AgentId, message: &str) -> Result<String>;
}
