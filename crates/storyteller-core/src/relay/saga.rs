use crate::error::{RelayError, Result};
use crate::types::AgentId;
use serde::Serialize;
use std::fmt;

/// Steps of the add-story flow, in execution order.
///
/// Steps commit independently. When a step fails, the effects of the
/// steps before it stay in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStep {
    Summarize,
    StoreSummary,
    PropagateToAgent,
}

impl StoryStep {
    pub const ALL: [StoryStep; 3] = [
        StoryStep::Summarize,
        StoryStep::StoreSummary,
        StoryStep::PropagateToAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStep::Summarize => "summarize",
            StoryStep::StoreSummary => "store_summary",
            StoryStep::PropagateToAgent => "propagate_to_agent",
        }
    }

    /// Tag a step's failure with the step that produced it.
    pub(crate) fn run<T>(self, result: Result<T>) -> Result<T> {
        result.map_err(|source| RelayError::Story {
            step: self,
            source: Box::new(source),
        })
    }
}

impl fmt::Display for StoryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the agent learned about a new story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentUpdate {
    /// An existing agent was told to add the summary to its memory.
    Appended(AgentId),
    /// No agent existed; one was created seeded with the summary.
    Created(AgentId),
}

impl AgentUpdate {
    pub fn agent_id(&self) -> &AgentId {
        match self {
            AgentUpdate::Appended(id) | AgentUpdate::Created(id) => id,
        }
    }
}

/// Result of a completed add-story flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryReceipt {
    /// Key the summary store assigned.
    pub summary_id: String,
    pub summary: String,
    pub agent: AgentUpdate,
}
