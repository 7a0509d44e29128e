//! Story summarization through an OpenAI-compatible chat completions API.

use crate::error::{RelayError, Result, Upstream};
use crate::types::ChatMessage;
use crate::upstream::{build_client, ensure_success, parse_json, request_failed, trim_base_url};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-4o";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes stories concisely.";

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Reduce a story to a short summary. Never returns empty text.
    async fn summarize(&self, story: &str) -> Result<String>;
}

/// Build the prompt sent for a story.
pub fn summary_prompt(story: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!("Please summarize the following story:\n\n{}", story)),
    ]
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Summarizer backed by `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiSummarizer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(Upstream::Completion, timeout)?,
            base_url: trim_base_url(base_url),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, story: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Summarizing {} chars with {}", story.len(), self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages: summary_prompt(story),
            })
            .send()
            .await
            .map_err(|e| request_failed(Upstream::Completion, e))?;

        let response = ensure_success(Upstream::Completion, response).await?;
        let completion: CompletionResponse = parse_json(Upstream::Completion, response).await?;

        let summary = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                RelayError::provider(Upstream::Completion, "Completion returned no content")
            })?;

        info!("Generated summary ({} chars)", summary.len());
        Ok(summary)
    }
}
