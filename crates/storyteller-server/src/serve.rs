use crate::config::{StoreBackend, StoreCredentials, StorytellerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use storyteller_core::*;
use tracing::{error, info, warn};

/// Wire the stores and upstream clients described by `config` into a relay.
pub fn build_relay(config: &StorytellerConfig) -> anyhow::Result<Relay> {
    let identity = Arc::new(FileIdentityStore::new(&config.server.agent_id_file));

    let summaries: Arc<dyn SummaryStore> = match config.store.backend {
        StoreBackend::Firebase => {
            let url = config
                .store
                .resolved_database_url()
                .ok_or_else(|| anyhow::anyhow!("[store] database_url is not set"))?;
            info!("Summary store: Firebase at {} ({})", url, config.store.path);
            let timeout = config.store.timeout();
            let store = match config.store.credentials()? {
                StoreCredentials::ServiceAccount(key, source) => {
                    info!(
                        "Firebase auth: service account {} (from {})",
                        key.client_email, source
                    );
                    let tokens = ServiceAccountTokens::new(key, timeout)?;
                    FirebaseSummaryStore::new(&url, None, timeout)?
                        .with_service_account(Arc::new(tokens))
                }
                StoreCredentials::Secret(secret, source) => {
                    info!("Firebase auth: database secret (from {})", source);
                    FirebaseSummaryStore::new(&url, Some(secret), timeout)?
                }
                StoreCredentials::None => {
                    warn!("Firebase auth: none; the database rules must allow public access");
                    FirebaseSummaryStore::new(&url, None, timeout)?
                }
            };
            Arc::new(store.with_path(config.store.path.clone()))
        }
        StoreBackend::Embedded => {
            info!("Summary store: embedded at {:?}", config.store.embedded_path);
            Arc::new(RedbSummaryStore::open(&config.store.embedded_path)?)
        }
    };

    let api_key = config
        .summarizer
        .resolved_api_key()
        .ok_or_else(|| anyhow::anyhow!("[summarizer] no API key configured"))?;
    let summarizer = Arc::new(OpenAiSummarizer::new(
        &config.summarizer.base_url,
        api_key,
        config.summarizer.model.clone(),
        config.summarizer.timeout(),
    )?);

    let token = config
        .agent
        .resolved_token()
        .ok_or_else(|| anyhow::anyhow!("[agent] no bearer token configured"))?;
    let agents = Arc::new(
        MemGptClient::new(&config.agent.server_url, token, config.agent.timeout())?
            .with_profile(config.agent.profile.clone()),
    );

    Ok(Relay::new(identity, summaries, summarizer, agents))
}

pub async fn run(config: StorytellerConfig, http_addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
    }

    let addr = http_addr.unwrap_or(config.server.http_addr);
    info!("Starting Storyteller relay v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP: {}", addr);
    info!("Agent server: {}", config.agent.server_url);
    info!("Agent ID file: {:?}", config.server.agent_id_file);

    let relay = Arc::new(build_relay(&config)?);
    match relay.current_agent().await {
        Ok(Some(id)) => info!("Using existing agent ID: {}", id),
        Ok(None) => info!("No agent yet; one will be created from the first story"),
        Err(e) => error!("Failed to read agent ID file: {}", e),
    }

    let app = crate::http::create_router(crate::http::AppState {
        relay,
        start_time: std::time::Instant::now(),
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP server on {}: {}", addr, e))?;

    let http_task = tokio::spawn(async move {
        info!("Server running on {}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server failed: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, terminating...");
    http_task.abort();

    Ok(())
}
