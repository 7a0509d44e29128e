//! Rust client for the Storyteller chat relay.
//!
//! Thin wrapper over the relay's JSON HTTP API.
//!
//! # Example
//! ```rust,no_run
//! use storyteller_client::StorytellerClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StorytellerClient::new("http://localhost:3001")?;
//!
//!     let story = client.new_story("Once upon a time, a fox learned to sing.").await?;
//!     println!("Stored summary {}", story.summary_id);
//!
//!     let reply = client.chat("What did the fox learn?").await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// A Storyteller relay client.
#[derive(Debug, Clone)]
pub struct StorytellerClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    pub success: bool,
    pub summary_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub healthy: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub agent_id: Option<String>,
}

#[derive(Deserialize)]
struct ChatReply {
    response: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
    details: Option<String>,
}

#[derive(Deserialize)]
struct Wrapped<T> {
    data: Option<T>,
}

impl StorytellerClient {
    /// `base_url` is the relay root, e.g. `"http://localhost:3001"`.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        // Story submissions wait on summarization and the agent server
        let http = Client::builder().timeout(Duration::from_secs(180)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Send a chat message; returns the agent's reply.
    pub async fn chat(&self, message: &str) -> anyhow::Result<String> {
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({ "message": message }))
            .send()
            .await?;
        let reply: ChatReply = Self::decode(resp).await?;
        Ok(reply.response)
    }

    /// Submit a new story for summarization.
    pub async fn new_story(&self, story: &str) -> anyhow::Result<NewStory> {
        let resp = self
            .http
            .post(format!("{}/api/new-story", self.base_url))
            .json(&json!({ "story": story }))
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn health(&self) -> anyhow::Result<Health> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        let wrapped: Wrapped<Health> = Self::decode(resp).await?;
        wrapped
            .data
            .ok_or_else(|| anyhow::anyhow!("health response carried no data"))
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> anyhow::Result<T> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let body: Value = resp.json().await.unwrap_or(Value::Null);
        match serde_json::from_value::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope {
                error,
                details: Some(details),
            }) => anyhow::bail!("{} ({}): {}", error, status, details),
            Ok(ErrorEnvelope { error, .. }) => anyhow::bail!("{} ({})", error, status),
            Err(_) => anyhow::bail!("request failed with {}", status),
        }
    }
}
