//! Client commands against a running relay.

use crate::cli::{ChatArgs, StoryArgs};
use anyhow::{Context, Result};
use storyteller_client::StorytellerClient;

pub async fn chat(args: ChatArgs, server: &str) -> Result<()> {
    let client = StorytellerClient::new(server)?;
    let reply = client.chat(&args.message).await?;
    println!("{}", reply);
    Ok(())
}

pub async fn story(args: StoryArgs, server: &str) -> Result<()> {
    let text = match (args.text, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read story from {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide the story text or --file"),
    };

    let client = StorytellerClient::new(server)?;
    let stored = client.new_story(&text).await?;
    println!("✅ Story added. Summary ID: {}", stored.summary_id);
    Ok(())
}

pub async fn status(server: &str) -> Result<()> {
    let client = StorytellerClient::new(server)?;
    let health = client.health().await?;
    println!("Storyteller v{} at {}", health.version, server);
    println!("  healthy: {}", health.healthy);
    println!("  uptime:  {}s", health.uptime_seconds);
    match health.agent_id {
        Some(id) => println!("  agent:   {}", id),
        None => println!("  agent:   none yet"),
    }
    Ok(())
}
