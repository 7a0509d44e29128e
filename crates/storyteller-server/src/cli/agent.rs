use crate::cli::AgentCommands;
use crate::config::StorytellerConfig;
use anyhow::Result;
use storyteller_core::{FileIdentityStore, IdentityStore};

pub async fn run(cmd: AgentCommands, config: StorytellerConfig) -> Result<()> {
    let store = FileIdentityStore::new(&config.server.agent_id_file);
    match cmd {
        AgentCommands::Show => match store.load().await? {
            Some(id) => println!("{}", id),
            None => println!("No agent yet ({} not found)", store.path().display()),
        },
        AgentCommands::Reset => match store.load().await? {
            Some(id) => {
                store.clear().await?;
                println!("Forgot agent {}. The next request will create a new one.", id);
                println!("The agent itself still exists on the agent server.");
            }
            None => println!("No agent to reset."),
        },
    }
    Ok(())
}
