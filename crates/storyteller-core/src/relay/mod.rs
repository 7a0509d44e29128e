//! Orchestration of the chat and add-story flows.
//!
//! The relay owns no conversation state of its own: summaries live in the
//! summary store, memory lives in the remote agent, and the only local
//! state is the cached agent id.

mod saga;

#[cfg(test)]
mod tests;

pub use saga::{AgentUpdate, StoryReceipt, StoryStep};

use crate::agent::AgentService;
use crate::error::{RelayError, Result};
use crate::identity::IdentityStore;
use crate::summarizer::Summarizer;
use crate::summary::SummaryStore;
use crate::types::AgentId;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What to seed a new agent with when no agent id is cached.
enum Fallback<'a> {
    /// Replay the most recent stored summary; no summary means no agent.
    LatestSummary,
    /// Use this summary.
    Seed(&'a str),
}

enum Resolved {
    Existing(AgentId),
    Created(AgentId),
}

pub struct Relay {
    identity: Arc<dyn IdentityStore>,
    summaries: Arc<dyn SummaryStore>,
    summarizer: Arc<dyn Summarizer>,
    agents: Arc<dyn AgentService>,
    /// Held while resolving and creating the agent, so concurrent requests
    /// that find no cached id produce a single agent.
    lease: Mutex<()>,
}

impl Relay {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        summaries: Arc<dyn SummaryStore>,
        summarizer: Arc<dyn Summarizer>,
        agents: Arc<dyn AgentService>,
    ) -> Self {
        Self {
            identity,
            summaries,
            summarizer,
            agents,
            lease: Mutex::new(()),
        }
    }

    /// Relay a user message to the agent and return its reply.
    ///
    /// Creates the agent from the latest stored summary on first use. Fails
    /// with [`RelayError::NoAgentAvailable`] when there is nothing to seed it
    /// with.
    pub async fn chat(&self, message: &str) -> Result<String> {
        require(message, "Message is required")?;

        let id = match self.resolve(Fallback::LatestSummary).await? {
            Resolved::Existing(id) | Resolved::Created(id) => id,
        };

        self.agents.converse(&id, message).await.map_err(|e| {
            error!("Error sending message to agent {}: {}", id, e);
            e
        })
    }

    /// Summarize a story, store the summary and propagate it to the agent.
    pub async fn add_story(&self, story: &str) -> Result<StoryReceipt> {
        require(story, "Story is required")?;

        let summary = StoryStep::Summarize.run(self.summarizer.summarize(story).await)?;
        info!("Generated summary: {}", summary);

        let summary_id = StoryStep::StoreSummary.run(self.summaries.append(&summary).await)?;

        let agent = StoryStep::PropagateToAgent.run(self.propagate(&summary).await)?;

        Ok(StoryReceipt {
            summary_id,
            summary,
            agent,
        })
    }

    /// The cached agent id, if any.
    pub async fn current_agent(&self) -> Result<Option<AgentId>> {
        self.identity.load().await
    }

    async fn propagate(&self, summary: &str) -> Result<AgentUpdate> {
        match self.resolve(Fallback::Seed(summary)).await? {
            Resolved::Existing(id) => {
                self.agents.append_memory(&id, summary).await?;
                Ok(AgentUpdate::Appended(id))
            }
            Resolved::Created(id) => Ok(AgentUpdate::Created(id)),
        }
    }

    async fn resolve(&self, fallback: Fallback<'_>) -> Result<Resolved> {
        let _lease = self.lease.lock().await;

        if let Some(id) = self.identity.load().await? {
            return Ok(Resolved::Existing(id));
        }

        let seed = match fallback {
            Fallback::Seed(summary) => summary.to_string(),
            Fallback::LatestSummary => match self.summaries.latest().await? {
                Some(latest) => latest.text,
                None => {
                    info!("No summary available. Please create a summary first.");
                    return Err(RelayError::NoAgentAvailable);
                }
            },
        };

        let id = self.provision(&seed).await?;
        Ok(Resolved::Created(id))
    }

    /// Create an agent and cache its id before anyone gets to use it.
    async fn provision(&self, seed: &str) -> Result<AgentId> {
        let id = self.agents.create_agent(seed).await?;
        self.identity.save(&id).await?;
        Ok(id)
    }
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(RelayError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}
