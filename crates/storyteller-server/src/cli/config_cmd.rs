use crate::cli::ConfigCommands;
use crate::config::StorytellerConfig;
use anyhow::Result;
use std::path::Path;

const REDACTED: &str = "<redacted>";

pub async fn run(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    // Same resolution as `serve`: a missing file means defaults plus env
    let config = StorytellerConfig::load_or_default(config_path)?;
    let origin = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("defaults ({} not found)", config_path.display())
    };

    match cmd {
        ConfigCommands::Validate => {
            let report = validate(&config, &origin)?;
            println!("{}", report);
            Ok(())
        }
        ConfigCommands::Show => {
            println!("# effective configuration from {}", origin);
            println!("{}", show(&config)?);
            Ok(())
        }
    }
}

/// Summary of where each credential resolves from, or every problem that
/// would keep `serve` from starting.
fn validate(config: &StorytellerConfig, origin: &str) -> Result<String> {
    let errors = config.validate();
    if !errors.is_empty() {
        anyhow::bail!(
            "{} has {} problem(s):\n  - {}",
            origin,
            errors.len(),
            errors.join("\n  - ")
        );
    }

    let mut report = format!("{} is valid.\nStore backend: {:?}", origin, config.store.backend);
    for (setting, source) in config.secret_sources() {
        match source {
            Some(source) => report.push_str(&format!("\n  {} <- {}", setting, source)),
            None => report.push_str(&format!("\n  {} not set", setting)),
        }
    }
    Ok(report)
}

/// TOML of the effective config with secrets masked.
fn show(config: &StorytellerConfig) -> Result<String> {
    let mut masked = config.clone();
    for secret in [
        &mut masked.summarizer.api_key,
        &mut masked.agent.token,
        &mut masked.store.auth,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    Ok(toml::to_string_pretty(&masked)?)
}
