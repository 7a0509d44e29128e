pub mod agent;
pub mod config_cmd;
pub mod relay;

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "storyteller")]
#[command(version, about = "Chat relay between a story client, an LLM summarizer and a MemGPT agent")]
pub struct Cli {
    /// Path to storyteller.toml
    #[arg(
        long,
        global = true,
        env = "STORYTELLER_CONFIG",
        default_value = "storyteller.toml"
    )]
    pub config: PathBuf,

    /// Relay address for client commands
    #[arg(
        long,
        global = true,
        env = "STORYTELLER_ADDR",
        default_value = "http://localhost:3001"
    )]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP relay
    Serve(ServeArgs),
    /// Send a chat message to a running relay
    Chat(ChatArgs),
    /// Submit a new story to a running relay
    Story(StoryArgs),
    /// Show the health of a running relay
    Status,
    /// Cached agent id management
    #[command(subcommand)]
    Agent(AgentCommands),
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// HTTP listen address (overrides config file)
    #[arg(long, env = "STORYTELLER_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message to send
    pub message: String,
}

#[derive(Args, Debug)]
pub struct StoryArgs {
    /// Story text
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub text: Option<String>,
    /// Read the story from a file instead
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Print the cached agent id
    Show,
    /// Forget the cached agent id; the next request creates a new agent
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    Validate,
    Show,
}
