mod cli;
mod config;
mod http;
mod serve;

use clap::Parser;
use cli::{Cli, Commands};
use config::StorytellerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = StorytellerConfig::load_or_default(&cli.config)?;
            serve::run(config, args.http_addr).await
        }
        Commands::Chat(args) => cli::relay::chat(args, &cli.server).await,
        Commands::Story(args) => cli::relay::story(args, &cli.server).await,
        Commands::Status => cli::relay::status(&cli.server).await,
        Commands::Agent(cmd) => {
            let config = StorytellerConfig::load_or_default(&cli.config)?;
            cli::agent::run(cmd, config).await
        }
        Commands::Config(cmd) => cli::config_cmd::run(cmd, &cli.config).await,
    }
}
