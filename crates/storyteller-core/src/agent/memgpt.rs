use super::reply::decode_reply;
use super::AgentService;
use crate::error::{RelayError, Result, Upstream};
use crate::types::{AgentId, ChatRole};
use crate::upstream::{build_client, ensure_success, request_failed, trim_base_url};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Fixed persona and model configuration for newly created agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    pub name: String,
    pub preset: String,
    pub human: String,
    pub persona: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            name: "StorytellerAgent".to_string(),
            preset: "memgpt_chat".to_string(),
            human: "user".to_string(),
            persona: "assistant".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl AgentProfile {
    fn create_request(&self, seed_summary: &str) -> Value {
        json!({
            "config": {
                "name": self.name,
                "preset": self.preset,
                "human": self.human,
                "persona": self.persona,
                "llm_config": {
                    "model": self.model,
                    "max_tokens": self.max_tokens,
                    "temperature": self.temperature,
                },
            },
            "messages": [{
                "role": ChatRole::System,
                "content": seed_message(seed_summary),
            }],
        })
    }
}

pub(crate) fn seed_message(summary: &str) -> String {
    format!(
        "You are a storyteller AI with knowledge of the following story summary: {}",
        summary
    )
}

pub(crate) fn memory_update_message(summary: &str) -> String {
    format!(
        "Add this new story summary to your knowledge base, while retaining all previous story information: {}",
        summary
    )
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    agent_id: &'a str,
    message: &'a str,
    role: ChatRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct CreateAgentResponse {
    agent_state: AgentState,
}

#[derive(Deserialize)]
struct AgentState {
    id: String,
}

/// HTTP client for a MemGPT-style agent server.
#[derive(Debug, Clone)]
pub struct MemGptClient {
    client: Client,
    base_url: String,
    token: String,
    profile: AgentProfile,
}

impl MemGptClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(Upstream::AgentServer, timeout)?,
            base_url: trim_base_url(base_url),
            token: token.into(),
            profile: AgentProfile::default(),
        })
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profile = profile;
        self
    }

    fn messages_url(&self, id: &AgentId) -> String {
        format!(
            "{}/api/agents/{}/messages",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    async fn post_message(
        &self,
        id: &AgentId,
        body: &SendMessageRequest<'_>,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.messages_url(id))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(Upstream::AgentServer, e))?;
        ensure_success(Upstream::AgentServer, response).await
    }
}

/// Decode a 2xx agent server body. A body that is not the JSON we expect
/// is an unusable reply, not a transport failure.
async fn read_reply<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let text = response
        .text()
        .await
        .map_err(|e| request_failed(Upstream::AgentServer, e))?;
    serde_json::from_str(&text).map_err(|e| {
        RelayError::ResponseShape(format!(
            "agent server body is not valid JSON ({}): {}",
            e,
            text.chars().take(200).collect::<String>()
        ))
    })
}

#[async_trait]
impl AgentService for MemGptClient {
    async fn create_agent(&self, seed_summary: &str) -> Result<AgentId> {
        info!("Creating new agent with story memory...");
        let response = self
            .client
            .post(format!("{}/api/agents", self.base_url))
            .bearer_auth(&self.token)
            .json(&self.profile.create_request(seed_summary))
            .send()
            .await
            .map_err(|e| request_failed(Upstream::AgentServer, e))?;

        let response = ensure_success(Upstream::AgentServer, response).await?;
        let created: CreateAgentResponse = read_reply(response).await?;

        let id = AgentId::parse(&created.agent_state.id).ok_or_else(|| {
            RelayError::ResponseShape("agent server returned an empty agent id".to_string())
        })?;
        info!("New agent created with ID: {}", id);
        Ok(id)
    }

    async fn append_memory(&self, id: &AgentId, summary: &str) -> Result<()> {
        info!("Updating agent {} with new summary...", id);
        let message = memory_update_message(summary);
        self.post_message(
            id,
            &SendMessageRequest {
                agent_id: id.as_str(),
                message: &message,
                role: ChatRole::System,
                stream: None,
            },
        )
        .await?;
        info!("Agent memory updated successfully with new story");
        Ok(())
    }

    async fn converse(&self, id: &AgentId, message: &str) -> Result<String> {
        debug!("Sending message to agent {}: {:?}", id, message);
        let response = self
            .post_message(
                id,
                &SendMessageRequest {
                    agent_id: id.as_str(),
                    message,
                    role: ChatRole::User,
                    stream: Some(false),
                },
            )
            .await?;

        let body: Value = read_reply(response).await?;
        decode_reply(body)
    }
}
